//! Ideal op-amp: a finite-gain VCVS through a branch-current unknown.

use voltaic_core::{Device, MnaSystem, Node};

/// The stamp enforces `(1/A)(v(out) - v(gnd_ref)) = v(pos) - v(neg)` on the
/// branch row, so the output drives whatever current keeps the constraint.
/// A pure linear device: no DC/transient nonlinear load.
#[derive(Debug, Clone)]
pub struct OpAmp {
    pos: Node,
    neg: Node,
    out: Node,
    gnd_ref: Node,
    branch: usize,
    gain: f64,
}

impl OpAmp {
    pub fn new(pos: Node, neg: Node, out: Node, gnd_ref: Node, branch: usize, gain: f64) -> Self {
        Self {
            pos,
            neg,
            out,
            gnd_ref,
            branch,
            gain,
        }
    }
}

impl Device for OpAmp {
    fn load_linear(&self, mna: &mut MnaSystem) {
        let inv_a = 1.0 / self.gain;
        let b = Node::new(self.branch);
        mna.add_gl(self.out, b, 1.0);
        mna.add_gl(self.gnd_ref, b, -1.0);
        mna.add_gl(b, self.out, inv_a);
        mna.add_gl(b, self.gnd_ref, -inv_a);
        mna.add_gl(b, self.pos, -1.0);
        mna.add_gl(b, self.neg, 1.0);
    }

    fn branch(&self) -> Option<usize> {
        Some(self.branch)
    }
}
