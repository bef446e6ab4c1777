//! Adaptive transient analysis.
//!
//! Variable-step trapezoidal integration driven by the shared Newton core.
//! The step controller works off a local-truncation-error estimate against a
//! 3-point polynomial predictor; Newton failures shrink the step and retry.
//! Two pseudo-Euler pre-steps prime the history before real stepping starts.

use indexmap::IndexMap;
use nalgebra::DVector;
use voltaic_core::Circuit;
use voltaic_core::matrix::{RowScale, algebraic_rows, mat_scale_add, mat_vec_multiply};

use crate::dc::solve_dc;
use crate::error::{Error, Result};
use crate::newton::{MAX_TRAN_ITERS, RELTOL, find_solution};

/// How much the LTE controller may grow the timestep at once.
const TIME_STEP_INCREASE_FACTOR: f64 = 2.0;
/// Limit on a one-iteration LTE timestep shrink.
const LTE_STEP_DECREASE_FACTOR: f64 = 8.0;
/// Newton-failure timestep shrink.
const NR_STEP_DECREASE_FACTOR: f64 = 4.0;
/// LTE to Newton tolerance ratio.
const LTEREL: f64 = 10.0;
/// Hard cap on steps per detected source period.
const MAX_STEPS_PER_PERIOD: usize = 50_000;

/// Transient result: the sampled time axis plus one sequence per net label
/// and per voltage-source branch current (`I(<name>)`).
#[derive(Debug, Clone)]
pub struct TransientResult {
    pub time: Vec<f64>,
    pub signals: IndexMap<String, Vec<f64>>,
}

impl TransientResult {
    pub fn signal(&self, label: &str) -> Option<&[f64]> {
        self.signals.get(label).map(|v| v.as_slice())
    }

    /// Branch current sequence of the named voltage source.
    pub fn current(&self, source: &str) -> Option<&[f64]> {
        self.signal(&format!("I({})", source))
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Integrator state: the time wheel, integration coefficients, and 3-level
/// history of solutions, charges (`q`) and currents (`c`).
struct TranState {
    time: f64,
    oldt: f64,
    old2t: f64,
    old3t: f64,
    alpha0: f64,
    alpha1: f64,
    alpha2: f64,
    beta0: DVector<f64>,
    beta1: DVector<f64>,
    q: DVector<f64>,
    oldq: DVector<f64>,
    old2q: DVector<f64>,
    c: DVector<f64>,
    oldc: DVector<f64>,
    oldsol: DVector<f64>,
    old2sol: DVector<f64>,
    old3sol: DVector<f64>,
    min_step: f64,
    max_step: f64,
}

/// Assemble the transient residual and Jacobian at the current estimate:
/// device currents into `c`, charges `q = C·soln`, then
/// `rhs = β0·c + β1·c_prev - (α0·q + α1·q_prev + α2·q_prev2)` and
/// `matrix = β0·G + α0·C` (β0 per row, trap averaging off for algebraic
/// unknowns).
fn load_tran(ckt: &mut Circuit, st: &mut TranState) -> voltaic_core::Result<()> {
    let crnt = mat_vec_multiply(&ckt.mna.gl, &ckt.solution, -1.0)?;
    st.c.copy_from(&crnt);
    ckt.mna.g.copy_from(&ckt.mna.gl);
    for d in ckt.devices.iter() {
        d.load_tran(&mut ckt.mna, &ckt.solution, &mut st.c, st.time);
    }

    // Storage elements are linear.
    let q = mat_vec_multiply(&ckt.mna.c, &ckt.solution, 1.0)?;
    st.q.copy_from(&q);

    for i in 0..ckt.num_unknowns() {
        let dqdt = st.alpha0 * st.q[i] + st.alpha1 * st.oldq[i] + st.alpha2 * st.old2q[i];
        ckt.rhs[i] = st.beta0[i] * st.c[i] + st.beta1[i] * st.oldc[i] - dqdt;
    }

    mat_scale_add(
        &ckt.mna.g,
        &ckt.mna.c,
        RowScale::PerRow(&st.beta0),
        RowScale::Uniform(st.alpha0),
        &mut ckt.matrix,
    )
}

/// Lagrange coefficients of the 3-point predictor evaluated at `t`.
fn interp_coeffs(t: f64, t0: f64, t1: f64, t2: f64) -> [f64; 3] {
    let dtt0 = t - t0;
    let dtt1 = t - t1;
    let dtt2 = t - t2;
    let dt0dt1 = t0 - t1;
    let dt0dt2 = t0 - t2;
    let dt1dt2 = t1 - t2;
    [
        (dtt1 * dtt2) / (dt0dt1 * dt0dt2),
        (dtt0 * dtt2) / (-dt0dt1 * dt1dt2),
        (dtt0 * dtt1) / (dt0dt2 * dt1dt2),
    ]
}

/// Pick the next step size from the worst LTE ratio over the checked
/// unknowns. Cube root because trapezoidal local error is O(h³); shrinks get
/// a 0.75 safety factor, growth has 1.2 hysteresis so marginal gains don't
/// churn the step.
fn pick_step(ckt: &Circuit, st: &TranState, ltecheck: &[bool]) -> f64 {
    let min_shrink_factor = 1.0 / LTE_STEP_DECREASE_FACTOR;
    let p = interp_coeffs(st.time, st.oldt, st.old2t, st.old3t);
    let trapcoeff = 0.5 * (st.time - st.oldt) / (st.time - st.old3t);

    let mut max_lte_ratio = 0.0_f64;
    for i in 0..ckt.num_unknowns() {
        if ltecheck[i] {
            let pred = p[0] * st.oldsol[i] + p[1] * st.old2sol[i] + p[2] * st.old3sol[i];
            let lte = (ckt.solution[i] - pred).abs() * trapcoeff;
            let ratio = lte / (LTEREL * (ckt.abstol[i] + RELTOL * ckt.soln_max[i]));
            max_lte_ratio = max_lte_ratio.max(ratio);
        }
    }

    let mut lte_step_ratio = 1.0 / max_lte_ratio.cbrt();
    if lte_step_ratio < 1.0 {
        // Shrink the timestep to meet the error bound.
        lte_step_ratio = lte_step_ratio.max(min_shrink_factor);
        let new_step = (st.time - st.oldt) * 0.75 * lte_step_ratio;
        new_step.max(st.min_step)
    } else {
        lte_step_ratio = lte_step_ratio.min(TIME_STEP_INCREASE_FACTOR);
        let new_step = if lte_step_ratio > 1.2 {
            (st.time - st.oldt) * lte_step_ratio / 1.2
        } else {
            st.time - st.oldt
        };
        new_step.min(st.max_step)
    }
}

/// Run a transient analysis from `tstart` to `tstop` with roughly `ntpts`
/// requested output points per detected source period.
///
/// The operating point initializes the state unless `skip_dc` is set (or a
/// previous `solve_dc` already ran on this circuit). A failed operating
/// point degrades to integrating from zero with a warning. Unknowns named
/// in `probe_names` are always LTE-checked, even if algebraic.
pub fn solve_transient(
    ckt: &mut Circuit,
    ntpts: usize,
    tstart: f64,
    tstop: f64,
    probe_names: &[String],
    skip_dc: bool,
) -> Result<TransientResult> {
    if skip_dc {
        ckt.finalize()?;
    } else if !ckt.did_dc {
        match solve_dc(ckt) {
            Ok(_) => {}
            Err(Error::Core(e)) => return Err(e.into()),
            Err(e) => {
                log::warn!("operating point failed ({e}); starting transient from zero");
                ckt.refinalize()?;
            }
        }
    } else {
        ckt.finalize()?;
    }

    let n = ckt.num_unknowns();
    let mut result = TransientResult {
        time: Vec::new(),
        signals: IndexMap::new(),
    };
    if !(tstop > tstart) {
        return Ok(result);
    }

    let mut response: Vec<Vec<f64>> = vec![Vec::new(); n];

    // Mark the algebraic unknowns; those skip trap averaging and LTE checks
    // unless explicitly probed.
    let ar = algebraic_rows(&ckt.mna.c);
    let mut ltecheck: Vec<bool> = ar.iter().map(|a| !a).collect();
    for name in probe_names {
        if let Some(i) = ckt.node_by_label(name).and_then(|node| node.index()) {
            ltecheck[i] = true;
        }
    }

    // Faster periodic excitations force finer default resolution.
    let mut period = tstop - tstart;
    for d in ckt.devices.iter() {
        if let Some(p) = d.source_period() {
            period = period.min(p);
        }
    }
    let periods = ((tstop - tstart) / period).ceil().max(1.0) as usize;

    let max_step = (tstop - tstart) / (periods as f64 * ntpts.max(1) as f64);
    let min_step = max_step / 1e8;
    let mut new_step = max_step / 1e6;

    let mut st = TranState {
        time: tstart,
        oldt: tstart - new_step,
        old2t: tstart - 2.0 * new_step,
        old3t: tstart - 3.0 * new_step,
        alpha0: 1.0,
        alpha1: 0.0,
        alpha2: 0.0,
        beta0: DVector::from_element(n, 1.0),
        beta1: DVector::zeros(n),
        q: DVector::zeros(n),
        oldq: DVector::zeros(n),
        old2q: DVector::zeros(n),
        c: DVector::zeros(n),
        oldc: DVector::zeros(n),
        oldsol: DVector::zeros(n),
        old2sol: DVector::zeros(n),
        old3sol: DVector::zeros(n),
        min_step,
        max_step,
    };

    // Prime charges, currents and solution history at the starting state.
    load_tran(ckt, &mut st)?;
    for i in 0..n {
        st.old3sol[i] = ckt.solution[i];
        st.old2sol[i] = ckt.solution[i];
        st.oldsol[i] = ckt.solution[i];
        st.old2q[i] = st.q[i];
        st.oldq[i] = st.q[i];
        st.oldc[i] = st.c[i];
    }

    // Two pseudo-Euler pre-steps, then variable-step trapezoidal.
    let max_nsteps = (periods * MAX_STEPS_PER_PERIOD) as i64;
    let mut step_index: i64 = -3;
    while step_index < max_nsteps {
        // Record the just-computed solution and rotate the history wheel.
        for i in 0..n {
            if step_index >= 0 {
                response[i].push(ckt.solution[i]);
            }
            st.oldc[i] = st.c[i];
            st.old3sol[i] = st.old2sol[i];
            st.old2sol[i] = st.oldsol[i];
            st.oldsol[i] = ckt.solution[i];
            st.old2q[i] = st.oldq[i];
            st.oldq[i] = st.q[i];
        }

        let (beta0, beta1);
        if step_index < 0 {
            // Pre-step at tstart using backward Euler; the time wheel keeps
            // marching backwards to fake a uniform history.
            st.old3t = st.old2t - (st.oldt - st.old2t);
            st.old2t = st.oldt - (tstart - st.oldt);
            st.oldt = tstart - (st.time - st.oldt);
            st.time = tstart;
            beta0 = 1.0;
            beta1 = 0.0;
        } else {
            result.time.push(st.time);
            st.old3t = st.old2t;
            st.old2t = st.oldt;
            st.oldt = st.time;

            // Come smoothly into the interval end: land exactly on tstop and
            // blend the last two steps so no sliver step remains.
            if st.time >= tstop {
                break;
            } else if st.time + new_step > tstop {
                st.time = tstop;
            } else if st.time + 1.5 * new_step > tstop {
                st.time += (2.0 / 3.0) * (tstop - st.time);
            } else {
                st.time += new_step;
            }

            // Never step across a waveform kink.
            if let Some(bp) = ckt.next_breakpoint(st.oldt) {
                if bp > st.oldt + st.min_step && bp < st.time {
                    st.time = bp;
                }
            }

            // Trapezoidal: average old and new currents.
            beta0 = 0.5;
            beta1 = 0.5;
        }

        // Current averaging is off for algebraic rows.
        for i in 0..n {
            let a = if ar[i] { 1.0 } else { 0.0 };
            st.beta0[i] = beta0 + a * beta1;
            st.beta1[i] = (1.0 - a) * beta1;
        }

        // Find a Newton-converging timestep with acceptable LTE.
        loop {
            st.alpha0 = 1.0 / (st.time - st.oldt);
            st.alpha1 = -st.alpha0;
            st.alpha2 = 0.0;

            // Very small steps run backward Euler for stability.
            if (st.time - st.oldt) < 1.0e-4 * tstop {
                for i in 0..n {
                    st.beta0[i] = 1.0;
                    st.beta1[i] = 0.0;
                }
            }

            let iterations = {
                let stref = &mut st;
                let mut load = |ckt: &mut Circuit| load_tran(ckt, stref);
                find_solution(ckt, &mut load, MAX_TRAN_ITERS)?
            };

            let at_min_step = (st.time - st.oldt) < (1.0 + RELTOL) * st.min_step;
            if iterations.is_some() && (step_index <= 0 || at_min_step) {
                // Accept outright; from the floor, the next step grows.
                if step_index > 0 {
                    new_step = TIME_STEP_INCREASE_FACTOR * st.min_step;
                }
                break;
            } else if iterations.is_none() {
                if at_min_step {
                    return Err(Error::NonConvergence(MAX_TRAN_ITERS));
                }
                // Newton failure: shrink the step and retry, bounded below.
                st.time = st.oldt + (st.time - st.oldt) / NR_STEP_DECREASE_FACTOR;
                if st.time - st.oldt < st.min_step {
                    st.time = st.oldt + st.min_step;
                }
            } else {
                new_step = pick_step(ckt, &st, &ltecheck);
                if new_step < (1.0 - RELTOL) * (st.time - st.oldt) {
                    // Too much truncation error: redo this step shorter.
                    st.time = st.oldt + new_step;
                } else {
                    // Step stands; new_step sizes the next one.
                    break;
                }
            }
        }

        step_index += 1;
    }

    let len = result.time.len();
    for (label, node) in ckt.labels() {
        let series = match node.index() {
            Some(i) => response[i].clone(),
            None => vec![0.0; len],
        };
        result.signals.insert(label.to_string(), series);
    }
    for &idx in ckt.voltage_source_indices() {
        if let Some(branch) = ckt.devices[idx].branch() {
            result.signals.insert(
                format!("I({})", ckt.device_name(idx)),
                response[branch].clone(),
            );
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltaic_core::{Node, NodeKind};
    use voltaic_devices::{Capacitor, Inductor, Resistor, VoltageSource, Waveform};

    fn add_vsource(ckt: &mut Circuit, name: &str, npos: Node, spec: &str) {
        let branch = ckt.node(None, NodeKind::Current, None).index().unwrap();
        ckt.add_device(
            name,
            Box::new(VoltageSource::new(
                npos,
                Node::GROUND,
                branch,
                Waveform::parse(spec),
            )),
        );
    }

    #[test]
    fn test_rc_step_charging_matches_analytic() {
        // 1k / 1u: tau = 1ms, stepped at t ~ 0.
        let mut ckt = Circuit::new();
        ckt.map_ground("0");
        let inp = ckt.node(Some("in"), NodeKind::Voltage, None);
        let out = ckt.node(Some("out"), NodeKind::Voltage, None);
        add_vsource(&mut ckt, "v1", inp, "step(0,1,0,1n)");
        ckt.add_device("r1", Box::new(Resistor::new(inp, out, 1000.0)));
        ckt.add_device("c1", Box::new(Capacitor::new(out, Node::GROUND, 1e-6)));

        let probes = vec!["out".to_string()];
        let result = solve_transient(&mut ckt, 100, 0.0, 5e-3, &probes, false).unwrap();

        assert!(result.len() > 10);
        let times = &result.time;
        let vout = result.signal("out").unwrap();
        assert_eq!(times.len(), vout.len());

        // Time axis is monotone and lands exactly on tstop.
        for w in times.windows(2) {
            assert!(w[1] > w[0], "time must advance: {} -> {}", w[0], w[1]);
        }
        let last = *times.last().unwrap();
        assert!((last - 5e-3).abs() < 1e-12, "final time {}", last);

        let tau = 1e-3;
        for (k, &t) in times.iter().enumerate() {
            if t < 1e-4 {
                continue; // skip the sliver steps around the source edge
            }
            let expect = 1.0 - (-t / tau).exp();
            assert!(
                (vout[k] - expect).abs() < 0.02,
                "V(out) at {}: {} vs {}",
                t,
                vout[k],
                expect
            );
        }

        // Fully charged by 5 tau.
        let final_v = *vout.last().unwrap();
        assert!((final_v - 0.9933).abs() < 0.01, "final {}", final_v);
    }

    #[test]
    fn test_rl_decay_with_skip_dc() {
        // 1k / 1H: tau = 1ms. Integrating from zero state, the node voltage
        // starts at the source value and decays as the inductor current
        // builds up.
        let mut ckt = Circuit::new();
        ckt.map_ground("0");
        let inp = ckt.node(Some("in"), NodeKind::Voltage, None);
        let a = ckt.node(Some("a"), NodeKind::Voltage, None);
        add_vsource(&mut ckt, "v1", inp, "1");
        ckt.add_device("r1", Box::new(Resistor::new(inp, a, 1000.0)));
        let branch = ckt.node(None, NodeKind::Current, None).index().unwrap();
        ckt.add_device("l1", Box::new(Inductor::new(a, Node::GROUND, branch, 1.0)));

        let probes = vec!["a".to_string()];
        let result = solve_transient(&mut ckt, 100, 0.0, 3e-3, &probes, true).unwrap();

        let times = &result.time;
        let va = result.signal("a").unwrap();
        let tau = 1.0 / 1000.0;
        for (k, &t) in times.iter().enumerate() {
            if t < 1e-4 {
                continue;
            }
            let expect = (-t / tau).exp();
            assert!(
                (va[k] - expect).abs() < 0.02,
                "V(a) at {}: {} vs {}",
                t,
                va[k],
                expect
            );
        }
    }

    #[test]
    fn test_sin_drive_reaches_filter_amplitude() {
        // RC low-pass driven at 1kHz: |H| = 1/sqrt(1 + (wRC)^2).
        let mut ckt = Circuit::new();
        ckt.map_ground("0");
        let inp = ckt.node(Some("in"), NodeKind::Voltage, None);
        let out = ckt.node(Some("out"), NodeKind::Voltage, None);
        add_vsource(&mut ckt, "v1", inp, "sin(0,1,1k)");
        ckt.add_device("r1", Box::new(Resistor::new(inp, out, 1000.0)));
        ckt.add_device("c1", Box::new(Capacitor::new(out, Node::GROUND, 0.1e-6)));

        let probes = vec!["out".to_string()];
        let result = solve_transient(&mut ckt, 100, 0.0, 3e-3, &probes, false).unwrap();

        let wrc = std::f64::consts::TAU * 1e3 * 1000.0 * 0.1e-6;
        let expect = 1.0 / (1.0 + wrc * wrc).sqrt();

        // Amplitude over the last (settled) period.
        let mut peak = 0.0_f64;
        for (k, &t) in result.time.iter().enumerate() {
            if t >= 2e-3 {
                peak = peak.max(result.signal("out").unwrap()[k].abs());
            }
        }
        assert!(
            (peak - expect).abs() < expect * 0.05,
            "peak {} vs {}",
            peak,
            expect
        );
    }

    #[test]
    fn test_current_sequence_reported() {
        let mut ckt = Circuit::new();
        ckt.map_ground("0");
        let inp = ckt.node(Some("in"), NodeKind::Voltage, None);
        add_vsource(&mut ckt, "v1", inp, "1");
        ckt.add_device("r1", Box::new(Resistor::new(inp, Node::GROUND, 1000.0)));

        let result = solve_transient(&mut ckt, 50, 0.0, 1e-3, &[], false).unwrap();
        let i = result.current("v1").unwrap();
        assert_eq!(i.len(), result.len());
        // Steady resistive load: source delivers 1mA throughout.
        for v in i {
            assert!((v + 1e-3).abs() < 1e-6, "I(v1) sample {}", v);
        }
    }

    #[test]
    fn test_degenerate_interval_is_empty() {
        let mut ckt = Circuit::new();
        ckt.map_ground("0");
        let inp = ckt.node(Some("in"), NodeKind::Voltage, None);
        add_vsource(&mut ckt, "v1", inp, "1");
        let result = solve_transient(&mut ckt, 50, 1e-3, 1e-3, &[], false).unwrap();
        assert!(result.is_empty());
    }
}
