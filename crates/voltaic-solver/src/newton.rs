//! Newton-Raphson core shared by the DC and transient analyses.

use nalgebra::DVector;
use voltaic_core::matrix::mat_solve_rq;
use voltaic_core::{Circuit, NodeKind};

use crate::error::Result;

/// Voltage-limited Newton step bound; limiting keeps MOS and diode circuits
/// from overshooting into exponential overflow territory.
const V_NEWT_LIM: f64 = 0.3;
/// Relative tolerance to the largest observed value per unknown.
pub(crate) const RELTOL: f64 = 1e-4;
/// Max DC iterations before giving up.
pub(crate) const DC_MAX_ITERS: usize = 1000;
/// Max transient iterations per step before shrinking the step.
pub(crate) const MAX_TRAN_ITERS: usize = 20;

/// The residual/Jacobian loader contract: fill `ckt.rhs` with `-f` evaluated
/// at `ckt.solution` and `ckt.matrix` with `df/dx` (note the sign pattern).
pub type Loader<'a> = dyn FnMut(&mut Circuit) -> voltaic_core::Result<()> + 'a;

/// Iterate the loader to convergence.
///
/// Returns `Ok(Some(iterations))` on convergence (and updates
/// `ckt.soln_max`), `Ok(None)` when the iteration cap is exhausted — the
/// transient driver treats that as a recoverable signal to shrink its step.
///
/// Convergence needs both a loose residual-norm check (the norm is summed
/// over voltage-type rows, which carry current residuals) and a per-unknown
/// delta check against `abstol + reltol·soln_max`. When the residual norm
/// regresses, the last step is undone and voltage deltas are clamped to
/// ±0.3V until the norm has fallen for ten straight iterations.
pub fn find_solution(
    ckt: &mut Circuit,
    load: &mut Loader<'_>,
    max_iters: usize,
) -> Result<Option<usize>> {
    let n = ckt.num_unknowns();
    let res_check_abs = voltaic_core::circuit::I_ABSTOL.sqrt();
    let res_check_rel = RELTOL.sqrt();

    let mut d_sol: DVector<f64> = DVector::zeros(n);
    let mut use_limiting = false;
    let mut down_count = 0;
    let mut abssum_old = 0.0;
    let mut abssum_compare = 0.0;

    let mut iter = 0;
    while iter < max_iters {
        load(ckt)?;

        let mut abssum_rhs = 0.0;
        for i in 0..n {
            if ckt.kind(i) == NodeKind::Voltage {
                abssum_rhs += ckt.rhs[i].abs();
            }
        }

        if iter > 0 && !use_limiting && abssum_old < abssum_rhs {
            // The old norm was better: undo the last step and re-apply it
            // clamped below.
            for i in 0..n {
                ckt.solution[i] -= d_sol[i];
            }
            iter -= 1;
            use_limiting = true;
        } else {
            d_sol = mat_solve_rq(&ckt.matrix, &ckt.rhs)?;

            // Stop limiting once the norm has gone down for ten iterations.
            if abssum_rhs < abssum_old {
                down_count += 1;
            } else {
                down_count = 0;
            }
            if down_count > 10 {
                use_limiting = false;
                down_count = 0;
            }
            abssum_old = abssum_rhs;
        }

        if iter == 0 || abssum_rhs > abssum_compare {
            abssum_compare = abssum_rhs;
        }

        // Loose residue check; don't give up on the last iteration.
        let mut converged =
            !(iter < max_iters - 1 && abssum_rhs > res_check_abs + res_check_rel * abssum_compare);

        for i in 0..n {
            if use_limiting && ckt.kind(i) == NodeKind::Voltage {
                d_sol[i] = d_sol[i].clamp(-V_NEWT_LIM, V_NEWT_LIM);
            }
            ckt.solution[i] += d_sol[i];
            let thresh = ckt.abstol[i] + RELTOL * ckt.soln_max[i];
            if d_sol[i].abs() > thresh {
                converged = false;
            }
        }

        if converged {
            for i in 0..n {
                if ckt.solution[i].abs() > ckt.soln_max[i] {
                    ckt.soln_max[i] = ckt.solution[i].abs();
                }
            }
            return Ok(Some(iter + 1));
        }
        iter += 1;
    }

    Ok(None)
}
