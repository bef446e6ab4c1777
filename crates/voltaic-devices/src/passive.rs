//! Passive elements: resistor, capacitor, inductor.

use voltaic_core::{Device, MnaSystem, Node};

/// A linear resistor, stamped as its admittance.
#[derive(Debug, Clone)]
pub struct Resistor {
    n1: Node,
    n2: Node,
    g: f64,
}

impl Resistor {
    /// `resistance` must be nonzero; the netlist layer turns zero-ohm
    /// resistors into 0V sources before getting here.
    pub fn new(n1: Node, n2: Node, resistance: f64) -> Self {
        Self {
            n1,
            n2,
            g: 1.0 / resistance,
        }
    }

    pub fn conductance(&self) -> f64 {
        self.g
    }
}

impl Device for Resistor {
    fn load_linear(&self, mna: &mut MnaSystem) {
        mna.stamp_conductance_linear(self.n1, self.n2, self.g);
    }
}

/// A linear capacitor, stamped into the `C` matrix.
#[derive(Debug, Clone)]
pub struct Capacitor {
    n1: Node,
    n2: Node,
    value: f64,
}

impl Capacitor {
    pub fn new(n1: Node, n2: Node, capacitance: f64) -> Self {
        Self {
            n1,
            n2,
            value: capacitance,
        }
    }
}

impl Device for Capacitor {
    fn load_linear(&self, mna: &mut MnaSystem) {
        mna.stamp_capacitance(self.n1, self.n2, self.value);
    }
}

/// A linear inductor with its own branch-current unknown.
#[derive(Debug, Clone)]
pub struct Inductor {
    n1: Node,
    n2: Node,
    branch: usize,
    value: f64,
}

impl Inductor {
    pub fn new(n1: Node, n2: Node, branch: usize, inductance: f64) -> Self {
        Self {
            n1,
            n2,
            branch,
            value: inductance,
        }
    }
}

impl Device for Inductor {
    fn load_linear(&self, mna: &mut MnaSystem) {
        // L sits on the diagonal of C because L di/dt = v(n1) - v(n2).
        let b = Node::new(self.branch);
        mna.add_gl(self.n1, b, 1.0);
        mna.add_gl(self.n2, b, -1.0);
        mna.add_gl(b, self.n1, -1.0);
        mna.add_gl(b, self.n2, 1.0);
        mna.add_c(b, b, self.value);
    }

    fn branch(&self) -> Option<usize> {
        Some(self.branch)
    }
}
