//! JSON netlist ingestion for Voltaic.
//!
//! The schematic layer hands the engine an ordered list of component
//! records `[type, geometry, properties, connections]`. This crate parses
//! that JSON, resolves net labels to circuit nodes, and instantiates device
//! models through a tag-to-factory [`DeviceRegistry`] owned by the caller
//! rather than a process-wide table.

pub mod component;
pub mod registry;

use thiserror::Error;

pub use component::{Component, Properties, parse_json, prop_f64, prop_string};
pub use registry::{DeviceFactory, DeviceRegistry, build_circuit};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid netlist: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
