//! Circuit topology and finalization.

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};

use crate::device::{Device, DeviceClass};
use crate::error::{Error, Result};
use crate::matrix::mat_rank;
use crate::mna::MnaSystem;
use crate::node::{Node, NodeKind};

/// Absolute voltage error tolerance.
pub const V_ABSTOL: f64 = 1e-6;
/// Absolute current error tolerance.
pub const I_ABSTOL: f64 = 1e-12;

/// A circuit: node bookkeeping, the device list, and (after [`Circuit::finalize`])
/// the assembled matrices and per-unknown solver vectors.
///
/// All mutable state belongs to one instance; analyses run sequentially and
/// reuse the allocated buffers.
#[derive(Debug)]
pub struct Circuit {
    /// Net label to node, immutable after finalize. Ground nets map to
    /// [`Node::GROUND`].
    node_map: IndexMap<String, Node>,
    kinds: Vec<NodeKind>,
    initial_conditions: Vec<Option<f64>>,
    /// Devices in insertion order. Populate through [`Circuit::add_device`];
    /// the name and source bookkeeping index into this list.
    pub devices: Vec<Box<dyn Device>>,
    device_names: Vec<String>,
    device_map: IndexMap<String, usize>,
    voltage_sources: Vec<usize>,
    has_current_sources: bool,
    finalized: bool,

    /// Set by the DC driver once an operating point has been computed.
    pub did_dc: bool,

    /// Stamp targets (`Gl`, `G`, `C`).
    pub mna: MnaSystem,
    /// The solve matrix handed to the linear solvers each iteration.
    pub matrix: DMatrix<f64>,
    pub solution: DVector<f64>,
    pub rhs: DVector<f64>,
    /// Largest magnitude ever seen per unknown, for relative tolerance.
    pub soln_max: DVector<f64>,
    /// Absolute tolerance per unknown, voltage- or current-typed.
    pub abstol: DVector<f64>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            node_map: IndexMap::new(),
            kinds: Vec::new(),
            initial_conditions: Vec::new(),
            devices: Vec::new(),
            device_names: Vec::new(),
            device_map: IndexMap::new(),
            voltage_sources: Vec::new(),
            has_current_sources: false,
            finalized: false,
            did_dc: false,
            mna: MnaSystem::new(0),
            matrix: DMatrix::zeros(0, 0),
            solution: DVector::zeros(0),
            rhs: DVector::zeros(0),
            soln_max: DVector::zeros(0),
            abstol: DVector::zeros(0),
        }
    }
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// The distinguished ground node.
    pub fn gnd_node(&self) -> Node {
        Node::GROUND
    }

    /// Allocate the next unknown, optionally binding a net label to it.
    pub fn node(&mut self, name: Option<&str>, kind: NodeKind, ic: Option<f64>) -> Node {
        let node = Node::new(self.kinds.len());
        if let Some(name) = name {
            self.node_map.insert(name.to_string(), node);
        }
        self.kinds.push(kind);
        self.initial_conditions.push(ic);
        node
    }

    /// Bind a net label to ground.
    pub fn map_ground(&mut self, label: &str) {
        self.node_map.insert(label.to_string(), Node::GROUND);
    }

    /// Look up a net label.
    pub fn node_by_label(&self, label: &str) -> Option<Node> {
        self.node_map.get(label).copied()
    }

    /// All net labels in insertion order, ground included.
    pub fn labels(&self) -> impl Iterator<Item = (&str, Node)> {
        self.node_map.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of unknowns allocated so far.
    pub fn num_unknowns(&self) -> usize {
        self.kinds.len()
    }

    pub fn kind(&self, index: usize) -> NodeKind {
        self.kinds[index]
    }

    /// Nodes carrying an explicit initial condition.
    pub fn initial_conditions(&self) -> impl Iterator<Item = (usize, f64)> {
        self.initial_conditions
            .iter()
            .enumerate()
            .filter_map(|(i, ic)| ic.map(|v| (i, v)))
    }

    /// Add a device. Duplicate names are warned about and the later device
    /// wins the name lookup, matching schematic-editor behavior.
    pub fn add_device(&mut self, name: impl Into<String>, device: Box<dyn Device>) -> usize {
        let name = name.into();
        let index = self.devices.len();
        match device.class() {
            DeviceClass::VoltageSource => self.voltage_sources.push(index),
            DeviceClass::CurrentSource => self.has_current_sources = true,
            DeviceClass::Passive => {}
        }
        if !name.is_empty() {
            if self.device_map.contains_key(&name) {
                log::warn!("two circuit elements share the name {name}; keeping the later one");
            }
            self.device_map.insert(name.clone(), index);
        }
        self.device_names.push(name);
        self.devices.push(device);
        index
    }

    pub fn device_index(&self, name: &str) -> Option<usize> {
        self.device_map.get(name).copied()
    }

    pub fn device_name(&self, index: usize) -> &str {
        &self.device_names[index]
    }

    /// Indices of the independent voltage sources, in insertion order.
    pub fn voltage_source_indices(&self) -> &[usize] {
        &self.voltage_sources
    }

    pub fn has_current_sources(&self) -> bool {
        self.has_current_sources
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Earliest device breakpoint at or after `time`.
    pub fn next_breakpoint(&self, time: f64) -> Option<f64> {
        self.devices
            .iter()
            .filter_map(|d| d.breakpoint(time))
            .min_by(|a, b| a.total_cmp(b))
    }

    /// One-shot preparation for simulation: allocate the matrices and solver
    /// vectors, give every device its `finalize` and `load_linear` pass, and
    /// reject voltage-source loops.
    ///
    /// The loop check compares the rank of the `Gl` submatrix made of the
    /// voltage-source branch rows against the source count; a deficit means
    /// some source is shorted or loops another one, and no solve is
    /// attempted.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let n = self.kinds.len();
        self.mna = MnaSystem::new(n);
        self.matrix = DMatrix::zeros(n, n);
        self.solution = DVector::zeros(n);
        self.rhs = DVector::zeros(n);
        self.soln_max = DVector::zeros(n);
        self.abstol = DVector::from_fn(n, |i, _| match self.kinds[i] {
            NodeKind::Voltage => V_ABSTOL,
            NodeKind::Current => I_ABSTOL,
        });

        for d in self.devices.iter_mut() {
            d.finalize();
        }
        for d in self.devices.iter() {
            d.load_linear(&mut self.mna);
        }

        let n_vsrc = self.voltage_sources.len();
        if n_vsrc > 0 {
            let mut gv = DMatrix::zeros(n_vsrc, n);
            for (i, &dev) in self.voltage_sources.iter().enumerate() {
                let Some(branch) = self.devices[dev].branch() else {
                    continue;
                };
                for j in 0..n {
                    gv[(i, j)] = self.mna.gl[(branch, j)];
                }
            }
            if mat_rank(&gv) < n_vsrc {
                return Err(Error::ShortCircuit);
            }
        }

        Ok(())
    }

    /// Throw away the assembled matrices and finalize again. Used by the
    /// transient driver to restart from zero after a failed operating point.
    pub fn refinalize(&mut self) -> Result<()> {
        self.finalized = false;
        self.did_dc = false;
        self.finalize()
    }
}
