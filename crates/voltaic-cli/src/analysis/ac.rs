//! AC frequency-sweep subcommand.

use anyhow::Result;
use serde_json::json;
use voltaic_core::Circuit;
use voltaic_solver::solve_ac;

use crate::output;

pub fn run(
    ckt: &mut Circuit,
    points: usize,
    fstart: f64,
    fstop: f64,
    source: &str,
    json_out: bool,
) -> Result<()> {
    let sweep = solve_ac(ckt, points, fstart, fstop, source)
        .map_err(|e| anyhow::anyhow!("AC analysis error: {}", e))?;

    if json_out {
        println!(
            "{}",
            json!({
                "frequencies_log10": sweep.frequencies,
                "magnitude": sweep.magnitude,
                "phase": sweep.phase,
            })
        );
        return Ok(());
    }

    println!("AC Analysis ({} pts/decade, {} Hz to {} Hz, source {})",
        points, fstart, fstop, source);
    println!("==========================================");
    println!();

    let labels: Vec<&str> = sweep.magnitude.keys().map(String::as_str).collect();
    let mut columns = vec!["log10(f)"];
    columns.extend(labels.iter().copied());
    output::header(&columns);

    for (k, logf) in sweep.frequencies.iter().enumerate() {
        output::row(*logf, labels.iter().map(|l| sweep.magnitude[*l][k]));
    }

    println!();
    println!("Phase (degrees, unwrapped)");
    output::header(&columns);
    for (k, logf) in sweep.frequencies.iter().enumerate() {
        output::row(*logf, labels.iter().map(|l| sweep.phase[*l][k]));
    }

    println!();
    println!("Sweep complete ({} points).", sweep.frequencies.len());
    Ok(())
}
