//! Square-law MOSFET, no bulk connection and no body effect.

use nalgebra::DVector;
use voltaic_core::{Device, MnaSystem, Node, add_to_rhs, voltage_between};

/// Threshold voltage.
const VT: f64 = 0.5;
/// Transconductance parameter.
const KP: f64 = 20e-6;
/// Channel-length modulation.
const LAMBDA: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosPolarity {
    N,
    P,
}

/// Square-law FET. Subthreshold conduction is ignored: below `vgst = 0` the
/// device stamps nothing.
#[derive(Debug, Clone)]
pub struct Mosfet {
    d: Node,
    g: Node,
    s: Node,
    beta: f64,
    type_sign: f64,
}

impl Mosfet {
    /// `ratio` is the device W/L.
    pub fn new(d: Node, g: Node, s: Node, ratio: f64, polarity: MosPolarity) -> Self {
        Self {
            d,
            g,
            s,
            beta: KP * ratio,
            type_sign: match polarity {
                MosPolarity::N => 1.0,
                MosPolarity::P => -1.0,
            },
        }
    }
}

impl Device for Mosfet {
    fn load_linear(&self, _mna: &mut MnaSystem) {
        // Nonlinear, no linear piece.
    }

    fn load_dc(&self, mna: &mut MnaSystem, soln: &DVector<f64>, rhs: &mut DVector<f64>) {
        let (mut d, mut s) = (self.d, self.s);
        let mut vds = self.type_sign * voltage_between(soln, d, s);
        if vds < 0.0 {
            // Drain and source have swapped roles.
            std::mem::swap(&mut d, &mut s);
            vds = self.type_sign * voltage_between(soln, d, s);
        }
        let vgs = self.type_sign * voltage_between(soln, self.g, s);
        let vgst = vgs - VT;

        if vgst <= 0.0 {
            return;
        }

        let (beta, lambda) = (self.beta, LAMBDA);
        let (mut gmgs, ids, gds);
        if vgst < vds {
            // Saturation.
            gmgs = beta * (1.0 + lambda * vds) * vgst;
            ids = self.type_sign * 0.5 * gmgs * vgst;
            gds = 0.5 * beta * vgst * vgst * lambda;
        } else {
            // Triode region.
            gmgs = beta * (1.0 + lambda * vds);
            ids = self.type_sign * gmgs * vds * (vgst - 0.5 * vds);
            gds = gmgs * (vgst - vds) + beta * lambda * vds * (vgst - 0.5 * vds);
            gmgs *= vds;
        }

        // current flows into the drain and out the source
        add_to_rhs(rhs, d, -ids);
        add_to_rhs(rhs, s, ids);
        mna.stamp_conductance(d, s, gds);
        mna.add_g(s, s, gmgs);
        mna.add_g(d, s, -gmgs);
        mna.add_g(d, self.g, gmgs);
        mna.add_g(s, self.g, -gmgs);
    }
}
