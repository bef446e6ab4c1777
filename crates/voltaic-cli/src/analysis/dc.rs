//! DC operating-point subcommand.

use anyhow::Result;
use serde_json::json;
use voltaic_core::{Circuit, format_value};
use voltaic_solver::solve_dc;

pub fn run(ckt: &mut Circuit, json_out: bool) -> Result<()> {
    let op = solve_dc(ckt).map_err(|e| anyhow::anyhow!("DC operating point error: {}", e))?;

    if json_out {
        let mut map = serde_json::Map::new();
        for (label, v) in op.voltages.iter().chain(op.currents.iter()) {
            map.insert(label.clone(), json!(v));
        }
        println!("{}", serde_json::Value::Object(map));
        return Ok(());
    }

    println!("DC Operating Point Analysis");
    println!("===========================");
    println!();
    for (label, v) in &op.voltages {
        println!("  V({}) = {}V", label, format_value(*v));
    }
    for (label, i) in &op.currents {
        println!("  {} = {}A", label, format_value(*i));
    }
    println!();
    println!("Analysis complete.");
    Ok(())
}
