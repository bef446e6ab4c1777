//! Schematic component records.

use serde::Deserialize;
use serde_json::Value;
use voltaic_core::parse_value;

use crate::Result;

/// Component properties: a free-form key/value map. Values arrive as
/// strings in engineering notation or as plain JSON numbers.
pub type Properties = serde_json::Map<String, Value>;

/// One schematic record: `[type, geometry, properties, connections]`.
/// Geometry is display-only and ignored by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Component(
    pub String,
    #[serde(default)] pub Value,
    #[serde(default)] pub Properties,
    #[serde(default)] pub Vec<String>,
);

impl Component {
    pub fn type_tag(&self) -> &str {
        &self.0
    }

    pub fn properties(&self) -> &Properties {
        &self.2
    }

    /// Net labels, in terminal order.
    pub fn connections(&self) -> &[String] {
        &self.3
    }

    /// The `name` property, if present and non-empty.
    pub fn name(&self) -> Option<&str> {
        match self.2.get("name") {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// Read a numeric property, accepting engineering-notation strings and
/// plain numbers. Missing or malformed values return `None` so the caller
/// picks the default.
pub fn prop_f64(props: &Properties, key: &str) -> Option<f64> {
    match props.get(key)? {
        Value::String(s) => parse_value(s),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Read a property as a string (numbers are formatted back to text, for
/// waveform specs given as bare numbers).
pub fn prop_string(props: &Properties, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a JSON netlist: an array of component records.
pub fn parse_json(text: &str) -> Result<Vec<Component>> {
    Ok(serde_json::from_str(text)?)
}
