//! Voltaic command-line front end.
//!
//! Reads a JSON netlist (the schematic layer's component records) and runs
//! one analysis, printing aligned tables or machine-readable JSON.

mod analysis;
mod output;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use voltaic_netlist::{DeviceRegistry, build_circuit, parse_json};

#[derive(Parser)]
#[command(name = "voltaic", about = "MNA circuit simulator", version)]
struct Cli {
    /// JSON netlist produced by the schematic layer
    netlist: PathBuf,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// DC operating point
    Op,
    /// Small-signal frequency sweep
    Ac {
        /// Excitation source name
        #[arg(long)]
        source: String,
        /// Points per decade
        #[arg(long, default_value_t = 20)]
        points: usize,
        /// Sweep start frequency (Hz)
        #[arg(long)]
        fstart: f64,
        /// Sweep stop frequency (Hz)
        #[arg(long)]
        fstop: f64,
    },
    /// Time-domain transient
    Tran {
        /// Requested output points per source period
        #[arg(long, default_value_t = 100)]
        points: usize,
        /// Start time (s)
        #[arg(long, default_value_t = 0.0)]
        tstart: f64,
        /// Stop time (s)
        #[arg(long)]
        tstop: f64,
        /// Node to force into LTE checking (repeatable)
        #[arg(long)]
        probe: Vec<String>,
        /// Integrate from zero instead of the operating point
        #[arg(long)]
        skip_dc: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let text = fs::read_to_string(&cli.netlist)
        .with_context(|| format!("reading {}", cli.netlist.display()))?;
    let records = parse_json(&text).context("parsing netlist")?;
    let mut ckt = build_circuit(&records, &DeviceRegistry::default());

    match cli.command {
        Command::Op => analysis::dc::run(&mut ckt, cli.json),
        Command::Ac {
            source,
            points,
            fstart,
            fstop,
        } => analysis::ac::run(&mut ckt, points, fstart, fstop, &source, cli.json),
        Command::Tran {
            points,
            tstart,
            tstop,
            probe,
            skip_dc,
        } => analysis::transient::run(&mut ckt, points, tstart, tstop, &probe, skip_dc, cli.json),
    }
}
