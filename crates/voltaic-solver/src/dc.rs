//! DC operating-point analysis.

use indexmap::IndexMap;
use voltaic_core::Circuit;
use voltaic_core::matrix::{mat_copy, mat_vec_multiply};

use crate::error::{Error, Result};
use crate::newton::{DC_MAX_ITERS, find_solution};

/// DC solution: net voltages plus the branch current of every independent
/// voltage source, keyed `I(<name>)`. Ground nets read 0.
#[derive(Debug, Clone)]
pub struct OperatingPoint {
    pub voltages: IndexMap<String, f64>,
    pub currents: IndexMap<String, f64>,
}

impl OperatingPoint {
    pub fn voltage(&self, label: &str) -> Option<f64> {
        self.voltages.get(label).copied()
    }

    /// Branch current of the named voltage source.
    pub fn current(&self, source: &str) -> Option<f64> {
        self.currents.get(&format!("I({})", source)).copied()
    }
}

/// Assemble the DC residual and Jacobian at the current solution estimate:
/// `rhs = -Gl·soln` plus every device's `load_dc`, `G` rebuilt from `Gl`
/// then mutated by the devices, and the solve matrix copied from `G`.
pub(crate) fn load_dc(ckt: &mut Circuit) -> voltaic_core::Result<()> {
    let rhs = mat_vec_multiply(&ckt.mna.gl, &ckt.solution, -1.0)?;
    ckt.rhs.copy_from(&rhs);
    ckt.mna.g.copy_from(&ckt.mna.gl);
    for d in ckt.devices.iter() {
        d.load_dc(&mut ckt.mna, &ckt.solution, &mut ckt.rhs);
    }
    mat_copy(&ckt.mna.g, &mut ckt.matrix)?;
    Ok(())
}

/// Compute the DC operating point.
///
/// Finalizes the circuit (rejecting voltage-source loops), seeds the Newton
/// guess with any explicit initial conditions, and iterates to convergence.
/// A non-convergent circuit with current sources earns the more specific
/// missing-ground-path hint.
pub fn solve_dc(ckt: &mut Circuit) -> Result<OperatingPoint> {
    ckt.finalize()?;

    let ics: Vec<(usize, f64)> = ckt.initial_conditions().collect();
    for (i, v) in ics {
        ckt.solution[i] = v;
    }

    let mut load = |ckt: &mut Circuit| load_dc(ckt);
    match find_solution(ckt, &mut load, DC_MAX_ITERS)? {
        Some(_) => {
            ckt.did_dc = true;
            Ok(operating_point(ckt))
        }
        None => Err(if ckt.has_current_sources() {
            Error::NonConvergenceCurrentPath(DC_MAX_ITERS)
        } else {
            Error::NonConvergence(DC_MAX_ITERS)
        }),
    }
}

fn operating_point(ckt: &Circuit) -> OperatingPoint {
    let mut voltages = IndexMap::new();
    for (label, node) in ckt.labels() {
        let v = node.index().map(|i| ckt.solution[i]).unwrap_or(0.0);
        voltages.insert(label.to_string(), v);
    }

    let mut currents = IndexMap::new();
    for &idx in ckt.voltage_source_indices() {
        if let Some(branch) = ckt.devices[idx].branch() {
            currents.insert(
                format!("I({})", ckt.device_name(idx)),
                ckt.solution[branch],
            );
        }
    }

    OperatingPoint { voltages, currents }
}
