//! Tag-to-factory device registry and circuit construction.

use indexmap::IndexMap;
use voltaic_core::{Circuit, Node, NodeKind};
use voltaic_devices::{
    Bjt, BjtPolarity, Capacitor, CurrentSource, Diode, DiodeKind, Inductor, MosPolarity, Mosfet,
    OpAmp, Resistor, VoltageSource, Waveform,
};

use crate::component::{Component, prop_f64, prop_string};

/// Instantiate a device from a record into the circuit. `nodes` are the
/// record's connections already resolved to circuit nodes.
pub type DeviceFactory = fn(&mut Circuit, &Component, &[Node], &str);

/// Record types that carry no electrical meaning: view info, wires, ground
/// markers (consumed in the mapping pass), probes and text labels.
const INERT_TAGS: &[&str] = &["view", "w", "g", "s", "L"];

/// Meter/lamp/motor/buzzer markers: drawn by the schematic but electrically
/// inert in the engine.
const DISPLAY_TAGS: &[&str] = &["vm", "am", "mo", "so"];

fn node_at(nodes: &[Node], index: usize) -> Node {
    nodes.get(index).copied().unwrap_or(Node::GROUND)
}

fn zero_volt_source(ckt: &mut Circuit, nodes: &[Node], name: &str) {
    let branch = match ckt.node(None, NodeKind::Current, None).index() {
        Some(b) => b,
        None => return,
    };
    ckt.add_device(
        name,
        Box::new(VoltageSource::new(
            node_at(nodes, 0),
            node_at(nodes, 1),
            branch,
            Waveform::dc(0.0),
        )),
    );
}

fn resistor(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    let Some(r) = prop_f64(comp.properties(), "r") else {
        log::warn!("resistor {name} has no usable value; skipped");
        return;
    };
    if r == 0.0 {
        // Zero resistance is a 0V source, usable as a current probe.
        zero_volt_source(ckt, nodes, name);
        return;
    }
    ckt.add_device(
        name,
        Box::new(Resistor::new(node_at(nodes, 0), node_at(nodes, 1), r)),
    );
}

fn capacitor(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    let Some(c) = prop_f64(comp.properties(), "c") else {
        log::warn!("capacitor {name} has no usable value; skipped");
        return;
    };
    ckt.add_device(
        name,
        Box::new(Capacitor::new(node_at(nodes, 0), node_at(nodes, 1), c)),
    );
}

fn inductor(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    let Some(l) = prop_f64(comp.properties(), "l") else {
        log::warn!("inductor {name} has no usable value; skipped");
        return;
    };
    let Some(branch) = ckt.node(None, NodeKind::Current, None).index() else {
        return;
    };
    ckt.add_device(
        name,
        Box::new(Inductor::new(node_at(nodes, 0), node_at(nodes, 1), branch, l)),
    );
}

fn voltage_source(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    let spec = prop_string(comp.properties(), "v")
        .or_else(|| prop_string(comp.properties(), "volt"))
        .unwrap_or_else(|| "0".to_string());
    let Some(branch) = ckt.node(None, NodeKind::Current, None).index() else {
        return;
    };
    ckt.add_device(
        name,
        Box::new(VoltageSource::new(
            node_at(nodes, 0),
            node_at(nodes, 1),
            branch,
            Waveform::parse(&spec),
        )),
    );
}

fn current_source(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    let spec = prop_string(comp.properties(), "value").unwrap_or_else(|| "0".to_string());
    ckt.add_device(
        name,
        Box::new(CurrentSource::new(
            node_at(nodes, 0),
            node_at(nodes, 1),
            Waveform::parse(&spec),
        )),
    );
}

fn current_probe(ckt: &mut Circuit, _comp: &Component, nodes: &[Node], name: &str) {
    // An ammeter is a 0V source whose branch current gets reported.
    zero_volt_source(ckt, nodes, name);
}

fn diode(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    let area = prop_f64(comp.properties(), "area").unwrap_or(1.0);
    if area == 0.0 {
        log::debug!("diode {name} has zero area; discarded");
        return;
    }
    let kind = match prop_string(comp.properties(), "type").as_deref() {
        Some("normal") => DiodeKind::Normal,
        _ => DiodeKind::Ideal,
    };
    ckt.add_device(
        name,
        Box::new(Diode::new(node_at(nodes, 0), node_at(nodes, 1), area, kind)),
    );
}

fn bjt(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str, polarity: BjtPolarity) {
    let props = comp.properties();
    let area = prop_f64(props, "area").unwrap_or(1.0);
    let ics = prop_f64(props, "Ics").unwrap_or(1e-14);
    let ies = prop_f64(props, "Ies").unwrap_or(1e-14);
    let alpha_f = prop_f64(props, "alphaF").unwrap_or(0.98);
    let alpha_r = prop_f64(props, "alphaR").unwrap_or(0.1);
    // connections: collector, base, emitter
    ckt.add_device(
        name,
        Box::new(Bjt::new(
            node_at(nodes, 0),
            node_at(nodes, 1),
            node_at(nodes, 2),
            area,
            ics,
            ies,
            alpha_f,
            alpha_r,
            polarity,
        )),
    );
}

fn npn(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    bjt(ckt, comp, nodes, name, BjtPolarity::Npn);
}

fn pnp(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    bjt(ckt, comp, nodes, name, BjtPolarity::Pnp);
}

fn fet(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str, polarity: MosPolarity) {
    let ratio = prop_f64(comp.properties(), "WL").unwrap_or(1.0);
    // connections: drain, gate, source
    ckt.add_device(
        name,
        Box::new(Mosfet::new(
            node_at(nodes, 0),
            node_at(nodes, 1),
            node_at(nodes, 2),
            ratio,
            polarity,
        )),
    );
}

fn nfet(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    fet(ckt, comp, nodes, name, MosPolarity::N);
}

fn pfet(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    fet(ckt, comp, nodes, name, MosPolarity::P);
}

fn opamp(ckt: &mut Circuit, comp: &Component, nodes: &[Node], name: &str) {
    let gain = prop_f64(comp.properties(), "A").unwrap_or(30000.0);
    let Some(branch) = ckt.node(None, NodeKind::Current, None).index() else {
        return;
    };
    // connections: plus input, minus input, output, ground reference
    ckt.add_device(
        name,
        Box::new(OpAmp::new(
            node_at(nodes, 0),
            node_at(nodes, 1),
            node_at(nodes, 2),
            node_at(nodes, 3),
            branch,
            gain,
        )),
    );
}

/// Map from record type tag to device factory. Owned by whoever builds
/// circuits from netlists; extendable with custom tags.
pub struct DeviceRegistry {
    factories: IndexMap<String, DeviceFactory>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        let mut registry = DeviceRegistry {
            factories: IndexMap::new(),
        };
        registry.register("r", resistor);
        registry.register("rv", resistor); // variable resistor
        registry.register("f", resistor); // fuse
        registry.register("vb", resistor);
        registry.register("c", capacitor);
        registry.register("l", inductor);
        registry.register("v", voltage_source);
        registry.register("volt", voltage_source);
        registry.register("i", current_source);
        registry.register("a", current_probe);
        registry.register("d", diode);
        registry.register("npn", npn);
        registry.register("pnp", pnp);
        registry.register("n", nfet);
        registry.register("p", pfet);
        registry.register("o", opamp);
        registry
    }
}

impl DeviceRegistry {
    pub fn register(&mut self, tag: impl Into<String>, factory: DeviceFactory) {
        self.factories.insert(tag.into(), factory);
    }

    pub fn get(&self, tag: &str) -> Option<DeviceFactory> {
        self.factories.get(tag).copied()
    }
}

/// Build a circuit from an ordered list of component records.
///
/// The first pass maps every `g` record's net to ground; the second
/// resolves connections (allocating voltage nodes on first sight of a
/// label), auto-names anonymous devices `_<index>`, and dispatches each
/// record through the registry. Records that fail to produce a device are
/// skipped with a warning rather than aborting the netlist.
pub fn build_circuit(records: &[Component], registry: &DeviceRegistry) -> Circuit {
    let mut ckt = Circuit::new();

    for component in records {
        if component.type_tag() == "g" {
            if let Some(net) = component.connections().first() {
                ckt.map_ground(net);
            }
        }
    }

    let mut found_ground = false;
    for (index, component) in records.iter().enumerate() {
        let tag = component.type_tag();
        if INERT_TAGS.contains(&tag) {
            continue;
        }
        if DISPLAY_TAGS.contains(&tag) {
            log::debug!("display-only component {tag} ignored");
            continue;
        }

        let name = component
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("_{index}"));

        let nodes: Vec<Node> = component
            .connections()
            .iter()
            .map(|net| match ckt.node_by_label(net) {
                Some(node) => {
                    if node.is_ground() {
                        found_ground = true;
                    }
                    node
                }
                None => ckt.node(Some(net), NodeKind::Voltage, None),
            })
            .collect();

        match registry.get(tag) {
            Some(factory) => factory(&mut ckt, component, &nodes, &name),
            None => log::warn!("unsupported component type {tag} ignored"),
        }
    }

    if !found_ground {
        log::warn!("netlist has no connection to ground");
    }

    ckt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::parse_json;

    #[test]
    fn test_divider_topology() {
        let json = r#"[
            ["g", null, {}, ["gnd"]],
            ["v", null, {"name": "v1", "v": "1"}, ["in", "gnd"]],
            ["r", null, {"name": "r1", "r": "1k"}, ["in", "mid"]],
            ["r", null, {"name": "r2", "r": "1k"}, ["mid", "gnd"]]
        ]"#;
        let records = parse_json(json).unwrap();
        let ckt = build_circuit(&records, &DeviceRegistry::default());

        assert!(ckt.node_by_label("gnd").unwrap().is_ground());
        assert!(!ckt.node_by_label("mid").unwrap().is_ground());
        // in, mid, plus the source branch
        assert_eq!(ckt.num_unknowns(), 3);
        assert_eq!(ckt.voltage_source_indices().len(), 1);
        assert!(ckt.device_index("r2").is_some());
    }

    #[test]
    fn test_auto_naming() {
        let json = r#"[
            ["g", null, {}, ["gnd"]],
            ["v", null, {"v": "1"}, ["in", "gnd"]]
        ]"#;
        let records = parse_json(json).unwrap();
        let ckt = build_circuit(&records, &DeviceRegistry::default());
        assert!(ckt.device_index("_1").is_some());
    }

    #[test]
    fn test_zero_ohm_resistor_becomes_probe() {
        let json = r#"[
            ["g", null, {}, ["gnd"]],
            ["v", null, {"name": "v1", "v": "1"}, ["in", "gnd"]],
            ["r", null, {"name": "rp", "r": "0"}, ["in", "out"]],
            ["r", null, {"name": "r1", "r": "1k"}, ["out", "gnd"]]
        ]"#;
        let records = parse_json(json).unwrap();
        let ckt = build_circuit(&records, &DeviceRegistry::default());
        // rp registers as a voltage source with a branch current.
        assert_eq!(ckt.voltage_source_indices().len(), 2);
    }

    #[test]
    fn test_inert_and_unknown_records_skipped() {
        let json = r#"[
            ["view", null, {}, []],
            ["g", null, {}, ["gnd"]],
            ["w", null, {}, ["a", "b"]],
            ["s", null, {}, ["mid"]],
            ["L", null, {}, ["mid"]],
            ["vm", null, {"name": "m1"}, ["in", "gnd"]],
            ["mystery", null, {}, ["in", "gnd"]],
            ["r", null, {"name": "r1", "r": "1k"}, ["in", "gnd"]]
        ]"#;
        let records = parse_json(json).unwrap();
        let ckt = build_circuit(&records, &DeviceRegistry::default());
        assert!(ckt.device_index("r1").is_some());
        assert!(ckt.device_index("m1").is_none());
        // wire and probe labels never allocate electrical nodes
        assert!(ckt.node_by_label("a").is_none());
    }

    #[test]
    fn test_zero_area_diode_discarded() {
        let json = r#"[
            ["g", null, {}, ["gnd"]],
            ["d", null, {"name": "d1", "area": "0"}, ["in", "gnd"]]
        ]"#;
        let records = parse_json(json).unwrap();
        let ckt = build_circuit(&records, &DeviceRegistry::default());
        assert!(ckt.device_index("d1").is_none());
    }

    #[test]
    fn test_custom_registration() {
        fn shunt(ckt: &mut Circuit, _comp: &Component, nodes: &[Node], name: &str) {
            ckt.add_device(
                name,
                Box::new(voltaic_devices::Resistor::new(nodes[0], nodes[1], 50.0)),
            );
        }

        let mut registry = DeviceRegistry::default();
        registry.register("term", shunt);

        let json = r#"[
            ["g", null, {}, ["gnd"]],
            ["term", null, {"name": "t1"}, ["in", "gnd"]]
        ]"#;
        let records = parse_json(json).unwrap();
        let ckt = build_circuit(&records, &registry);
        assert!(ckt.device_index("t1").is_some());
    }
}
