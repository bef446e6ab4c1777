//! Transient subcommand.

use anyhow::Result;
use serde_json::json;
use voltaic_core::Circuit;
use voltaic_solver::solve_transient;

use crate::output;

#[allow(clippy::too_many_arguments)]
pub fn run(
    ckt: &mut Circuit,
    points: usize,
    tstart: f64,
    tstop: f64,
    probes: &[String],
    skip_dc: bool,
    json_out: bool,
) -> Result<()> {
    let result = solve_transient(ckt, points, tstart, tstop, probes, skip_dc)
        .map_err(|e| anyhow::anyhow!("Transient error: {}", e))?;

    if json_out {
        println!(
            "{}",
            json!({
                "time": result.time,
                "signals": result.signals,
            })
        );
        return Ok(());
    }

    println!(
        "Transient Analysis ({} pts, {} s to {} s{})",
        points,
        tstart,
        tstop,
        if skip_dc { ", skip dc" } else { "" }
    );
    println!("==========================================");
    println!();

    let labels: Vec<&str> = result.signals.keys().map(String::as_str).collect();
    let mut columns = vec!["Time"];
    columns.extend(labels.iter().copied());
    output::header(&columns);

    for (k, t) in result.time.iter().enumerate() {
        output::row(*t, labels.iter().map(|l| result.signals[*l][k]));
    }

    println!();
    println!("Transient analysis complete ({} points).", result.len());
    Ok(())
}
