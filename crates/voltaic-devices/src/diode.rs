//! Junction diode with overflow-safe exponential evaluation.

use nalgebra::DVector;
use voltaic_core::{Device, MnaSystem, Node, add_to_rhs, voltage_between};

/// Saturation current before area scaling.
const IS: f64 = 1.0e-14;
/// Largest exponent argument evaluated exactly.
const EXP_ARG_MAX: f64 = 50.0;
/// e^50, the anchor for the quadratic extrapolation.
const EXP_MAX: f64 = 5.184705528587072e21;

/// Evaluate the junction current and conductance at `vd`.
///
/// Past `|vd/vt| = 50` the exponential is continued by a quadratic Taylor
/// expansion anchored at `e^50`, which keeps both the current and its
/// derivative finite and continuous so the Newton Jacobian stays usable at
/// wild intermediate guesses. Negative arguments use `exp(-x) = 1/exp(x)`.
pub fn diode_eval(vd: f64, vt: f64, is_sat: f64) -> (f64, f64) {
    let exp_arg = vd / vt;
    let abs_exp_arg = exp_arg.abs();
    let d_arg = abs_exp_arg - EXP_ARG_MAX;

    let (mut temp1, mut temp2);
    if d_arg > 0.0 {
        let quad = 1.0 + d_arg + 0.5 * d_arg * d_arg;
        temp1 = EXP_MAX * quad;
        temp2 = EXP_MAX * (1.0 + d_arg);
    } else {
        temp1 = abs_exp_arg.exp();
        temp2 = temp1;
    }
    if exp_arg < 0.0 {
        temp1 = 1.0 / temp1;
        temp2 = (temp1 * temp2) * temp1;
    }

    let id = is_sat * (temp1 - 1.0);
    let gd = is_sat * (temp2 / vt);
    (id, gd)
}

/// Thermal-voltage flavor of a diode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiodeKind {
    /// Ordinary junction, Vt = 25.8mV.
    Normal,
    /// Near-ideal switch (LED-like), Vt = 0.1mV.
    Ideal,
}

impl DiodeKind {
    fn thermal_voltage(self) -> f64 {
        match self {
            DiodeKind::Normal => 25.8e-3,
            DiodeKind::Ideal => 0.1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diode {
    anode: Node,
    cathode: Node,
    a_is: f64,
    vt: f64,
}

impl Diode {
    pub fn new(anode: Node, cathode: Node, area: f64, kind: DiodeKind) -> Self {
        Self {
            anode,
            cathode,
            a_is: area * IS,
            vt: kind.thermal_voltage(),
        }
    }
}

impl Device for Diode {
    fn load_linear(&self, _mna: &mut MnaSystem) {
        // No linear piece.
    }

    fn load_dc(&self, mna: &mut MnaSystem, soln: &DVector<f64>, rhs: &mut DVector<f64>) {
        let vd = voltage_between(soln, self.anode, self.cathode);
        let (id, gd) = diode_eval(vd, self.vt, self.a_is);

        // current flows into the anode and out of the cathode
        add_to_rhs(rhs, self.anode, -id);
        add_to_rhs(rhs, self.cathode, id);
        mna.stamp_conductance(self.anode, self.cathode, gd);
    }
}
