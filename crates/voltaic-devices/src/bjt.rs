//! Ebers-Moll bipolar transistor.

use nalgebra::DVector;
use voltaic_core::{Device, MnaSystem, Node, add_to_rhs, voltage_between};

use crate::diode::diode_eval;

/// Thermal voltage used for both junctions.
const VT: f64 = 0.026;
/// Collector-emitter leak for numerical robustness.
const LEAK_COND: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BjtPolarity {
    Npn,
    Pnp,
}

/// A basic Ebers-Moll BJT: two junction diodes (`vbe`, `vbc`) plus forward
/// and reverse transport with gains `alpha_f`/`alpha_r`.
#[derive(Debug, Clone)]
pub struct Bjt {
    c: Node,
    b: Node,
    e: Node,
    a_ics: f64,
    a_ies: f64,
    alpha_f: f64,
    alpha_r: f64,
    type_sign: f64,
}

impl Bjt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        c: Node,
        b: Node,
        e: Node,
        area: f64,
        ics: f64,
        ies: f64,
        alpha_f: f64,
        alpha_r: f64,
        polarity: BjtPolarity,
    ) -> Self {
        Self {
            c,
            b,
            e,
            a_ics: area * ics,
            a_ies: area * ies,
            alpha_f,
            alpha_r,
            type_sign: match polarity {
                BjtPolarity::Npn => 1.0,
                BjtPolarity::Pnp => -1.0,
            },
        }
    }
}

impl Device for Bjt {
    fn load_linear(&self, _mna: &mut MnaSystem) {
        // Nonlinear, no linear piece.
    }

    fn load_dc(&self, mna: &mut MnaSystem, soln: &DVector<f64>, rhs: &mut DVector<f64>) {
        let (b, c, e) = (self.b, self.c, self.e);
        let vbc = self.type_sign * voltage_between(soln, b, c);
        let vbe = self.type_sign * voltage_between(soln, b, e);
        let (ir, gr) = diode_eval(vbc, VT, self.a_ics);
        let (if_, gf) = diode_eval(vbe, VT, self.a_ies);

        // Sign convention: emitter and collector currents are leaving.
        let ie = self.type_sign * (if_ - self.alpha_r * ir);
        let ic = self.type_sign * (ir - self.alpha_f * if_);
        let ib = -(ie + ic);

        add_to_rhs(rhs, b, ib);
        add_to_rhs(rhs, c, ic);
        add_to_rhs(rhs, e, ie);
        mna.stamp_conductance(b, e, gf);
        mna.stamp_conductance(b, c, gr);
        mna.stamp_conductance(c, e, LEAK_COND);

        let (af_gf, ar_gr) = (self.alpha_f * gf, self.alpha_r * gr);
        mna.add_g(b, c, ar_gr);
        mna.add_g(b, e, af_gf);
        mna.add_g(b, b, -(af_gf + ar_gr));

        mna.add_g(e, b, ar_gr);
        mna.add_g(e, c, -ar_gr);

        mna.add_g(c, b, af_gf);
        mna.add_g(c, e, -af_gf);
    }
}
