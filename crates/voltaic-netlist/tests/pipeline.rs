//! End-to-end tests: JSON netlist through every analysis.

use voltaic_netlist::{DeviceRegistry, build_circuit, parse_json};
use voltaic_solver::{solve_ac, solve_dc, solve_transient};

fn build(json: &str) -> voltaic_core::Circuit {
    let records = parse_json(json).unwrap();
    build_circuit(&records, &DeviceRegistry::default())
}

#[test]
fn test_divider_dc() {
    let mut ckt = build(
        r#"[
        ["g", null, {}, ["gnd"]],
        ["v", null, {"name": "v1", "v": "10"}, ["in", "gnd"]],
        ["r", null, {"name": "r1", "r": "1k"}, ["in", "mid"]],
        ["r", null, {"name": "r2", "r": "1k"}, ["mid", "gnd"]]
    ]"#,
    );

    let op = solve_dc(&mut ckt).unwrap();
    assert!((op.voltage("in").unwrap() - 10.0).abs() < 1e-6);
    assert!((op.voltage("mid").unwrap() - 5.0).abs() < 1e-6);
    assert_eq!(op.voltage("gnd"), Some(0.0));
    assert!((op.current("v1").unwrap() + 5e-3).abs() < 1e-8);
}

#[test]
fn test_current_probe_reads_branch_current() {
    let mut ckt = build(
        r#"[
        ["g", null, {}, ["gnd"]],
        ["v", null, {"name": "v1", "v": "1"}, ["in", "gnd"]],
        ["a", null, {"name": "am1"}, ["in", "x"]],
        ["r", null, {"name": "r1", "r": "1k"}, ["x", "gnd"]]
    ]"#,
    );

    let op = solve_dc(&mut ckt).unwrap();
    // The probe is a 0V source in series: same node voltage both sides,
    // branch current equal to the load current.
    assert!((op.voltage("x").unwrap() - 1.0).abs() < 1e-6);
    let i = op.current("am1").unwrap();
    assert!((i - 1e-3).abs() < 1e-8, "I(am1) = {}", i);
}

#[test]
fn test_rc_lowpass_ac() {
    let mut ckt = build(
        r#"[
        ["g", null, {}, ["gnd"]],
        ["v", null, {"name": "v1", "v": "dc(1)"}, ["in", "gnd"]],
        ["r", null, {"name": "r1", "r": "1k"}, ["in", "out"]],
        ["c", null, {"name": "c1", "c": "1u"}, ["out", "gnd"]]
    ]"#,
    );

    let sweep = solve_ac(&mut ckt, 20, 10.0, 10e3, "v1").unwrap();
    let rc = 1e-3;
    let mags = sweep.magnitude_of("out").unwrap();
    for (k, logf) in sweep.frequencies.iter().enumerate() {
        let wrc = std::f64::consts::TAU * 10f64.powf(*logf) * rc;
        let expect = 1.0 / (1.0 + wrc * wrc).sqrt();
        assert!(
            (mags[k] - expect).abs() < expect * 0.02,
            "magnitude at idx {}: {} vs {}",
            k,
            mags[k],
            expect
        );
    }
}

#[test]
fn test_rc_step_transient() {
    let mut ckt = build(
        r#"[
        ["g", null, {}, ["gnd"]],
        ["v", null, {"name": "v1", "v": "step(0,1,0,1n)"}, ["in", "gnd"]],
        ["r", null, {"name": "r1", "r": "1k"}, ["in", "out"]],
        ["c", null, {"name": "c1", "c": "1u"}, ["out", "gnd"]]
    ]"#,
    );

    let probes = vec!["out".to_string()];
    let result = solve_transient(&mut ckt, 100, 0.0, 5e-3, &probes, false).unwrap();
    let vout = result.signal("out").unwrap();
    let tau = 1e-3;
    for (k, &t) in result.time.iter().enumerate() {
        if t < 1e-4 {
            continue;
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
    assert_eq!(result.signal("gnd").unwrap().len(), result.len());
    assert_eq!(result.current("v1").unwrap().len(), result.len());
}

#[test]
fn test_diode_rectifier_dc() {
    let mut ckt = build(
        r#"[
        ["g", null, {}, ["gnd"]],
        ["v", null, {"name": "v1", "v": "5"}, ["in", "gnd"]],
        ["r", null, {"name": "r1", "r": "1k"}, ["in", "mid"]],
        ["d", null, {"name": "d1", "area": "1", "type": "normal"}, ["mid", "gnd"]]
    ]"#,
    );

    let op = solve_dc(&mut ckt).unwrap();
    let vmid = op.voltage("mid").unwrap();
    assert!((0.5..0.8).contains(&vmid), "diode drop {}", vmid);
}

#[test]
fn test_parallel_sources_short_circuit() {
    let mut ckt = build(
        r#"[
        ["g", null, {}, ["gnd"]],
        ["v", null, {"name": "v1", "v": "1"}, ["in", "gnd"]],
        ["v", null, {"name": "v2", "v": "2"}, ["in", "gnd"]]
    ]"#,
    );

    assert!(matches!(
        solve_dc(&mut ckt),
        Err(voltaic_solver::Error::Core(
            voltaic_core::Error::ShortCircuit
        ))
    ));
}
