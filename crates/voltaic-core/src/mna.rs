//! MNA matrix set and stamp helpers.
//!
//! The linearized circuit is written as `C dx/dt = G x + rhs` where `x`
//! holds node voltages and branch currents. `Gl` carries the conductances of
//! linear devices and is loaded once at finalize; `G` is rebuilt from `Gl`
//! every Newton iteration and then mutated by the nonlinear devices; `C`
//! holds capacitances and inductances.

use nalgebra::{DMatrix, DVector};

use crate::node::Node;

/// The three stamp targets shared by all devices.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// Linear-only conductances, loaded once.
    pub gl: DMatrix<f64>,
    /// Complete conductance matrix, rebuilt per Newton iteration.
    pub g: DMatrix<f64>,
    /// Capacitances and inductances.
    pub c: DMatrix<f64>,
}

impl Default for MnaSystem {
    fn default() -> Self {
        Self::new(0)
    }
}

impl MnaSystem {
    /// Create a zeroed system of `size` unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            gl: DMatrix::zeros(size, size),
            g: DMatrix::zeros(size, size),
            c: DMatrix::zeros(size, size),
        }
    }

    /// Number of unknowns.
    pub fn size(&self) -> usize {
        self.gl.nrows()
    }

    fn add_two_terminal(m: &mut DMatrix<f64>, i: Node, j: Node, v: f64) {
        match (i.index(), j.index()) {
            (Some(i), Some(j)) => {
                m[(i, i)] += v;
                m[(i, j)] -= v;
                m[(j, i)] -= v;
                m[(j, j)] += v;
            }
            (Some(i), None) => m[(i, i)] += v,
            (None, Some(j)) => m[(j, j)] += v,
            (None, None) => {}
        }
    }

    fn add_entry(m: &mut DMatrix<f64>, i: Node, j: Node, v: f64) {
        if let (Some(i), Some(j)) = (i.index(), j.index()) {
            m[(i, j)] += v;
        }
    }

    /// Stamp a conductance between two nodes into `Gl`.
    pub fn stamp_conductance_linear(&mut self, i: Node, j: Node, g: f64) {
        Self::add_two_terminal(&mut self.gl, i, j, g);
    }

    /// Stamp a conductance between two nodes into `G`.
    pub fn stamp_conductance(&mut self, i: Node, j: Node, g: f64) {
        Self::add_two_terminal(&mut self.g, i, j, g);
    }

    /// Stamp a capacitance between two nodes into `C`.
    pub fn stamp_capacitance(&mut self, i: Node, j: Node, c: f64) {
        Self::add_two_terminal(&mut self.c, i, j, c);
    }

    /// Add a single entry to `Gl`.
    pub fn add_gl(&mut self, i: Node, j: Node, v: f64) {
        Self::add_entry(&mut self.gl, i, j, v);
    }

    /// Add a single entry to `G`.
    pub fn add_g(&mut self, i: Node, j: Node, v: f64) {
        Self::add_entry(&mut self.g, i, j, v);
    }

    /// Add a single entry to `C`.
    pub fn add_c(&mut self, i: Node, j: Node, v: f64) {
        Self::add_entry(&mut self.c, i, j, v);
    }
}

/// Add `value` to the rhs row of `node` (dropped for ground).
pub fn add_to_rhs(rhs: &mut DVector<f64>, node: Node, value: f64) {
    if let Some(i) = node.index() {
        rhs[i] += value;
    }
}

/// Voltage between two nodes under the solution estimate `x`.
pub fn voltage_between(x: &DVector<f64>, i: Node, j: Node) -> f64 {
    let vi = i.index().map(|i| x[i]).unwrap_or(0.0);
    let vj = j.index().map(|j| x[j]).unwrap_or(0.0);
    vi - vj
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn test_stamp_conductance() {
        let mut mna = MnaSystem::new(2);
        mna.stamp_conductance_linear(Node::new(0), Node::new(1), 1.0e-3);

        assert_eq!(mna.gl[(0, 0)], 1.0e-3);
        assert_eq!(mna.gl[(1, 1)], 1.0e-3);
        assert_eq!(mna.gl[(0, 1)], -1.0e-3);
        assert_eq!(mna.gl[(1, 0)], -1.0e-3);
    }

    #[test]
    fn test_stamp_conductance_to_ground() {
        let mut mna = MnaSystem::new(2);
        mna.stamp_conductance_linear(Node::new(0), Node::GROUND, 2.0);

        assert_eq!(mna.gl[(0, 0)], 2.0);
        assert_eq!(mna.gl[(1, 1)], 0.0);
    }

    #[test]
    fn test_single_entry_ground_dropped() {
        let mut mna = MnaSystem::new(2);
        mna.add_gl(Node::GROUND, Node::new(1), 1.0);
        assert!(mna.gl.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_rhs_and_branch_voltage() {
        let mut rhs = dvector![0.0, 0.0];
        add_to_rhs(&mut rhs, Node::new(1), 5.0);
        add_to_rhs(&mut rhs, Node::GROUND, 7.0);
        assert_eq!(rhs[1], 5.0);

        let x = dvector![3.0, 1.0];
        assert_eq!(voltage_between(&x, Node::new(0), Node::new(1)), 2.0);
        assert_eq!(voltage_between(&x, Node::new(0), Node::GROUND), 3.0);
    }
}
