//!
//! Command-line driver for pad-by-pad gain calibration.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

use padgain_core::CalibConfig;
use padgain_fit::CalibrationPass;
use padgain_io::EventFileReader;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PadgainIo(#[from] padgain_io::Error),

    #[error("Fit error: {0}")]
    Fit(#[from] padgain_fit::Error),
}

/// Pad-by-pad gain calibration from calibration-source decay data.
#[derive(Parser)]
#[command(name = "padgain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the calibration pass over event files and write the gain table
    Calibrate {
        /// Input event file(s), one per sector
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file prefix
        #[arg(short, long)]
        output: PathBuf,

        /// Geometry file (JSON)
        #[arg(short, long)]
        geometry: PathBuf,

        /// Configuration file (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Previous run's gain table (JSON); enables update mode
        #[arg(short, long)]
        update_gains: Option<PathBuf>,
    },

    /// Show information about an event file
    Info {
        /// Input event file
        input: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Calibrate {
            input,
            output,
            geometry,
            config,
            update_gains,
        } => calibrate(&input, &output, &geometry, config.as_deref(), update_gains.as_deref()),
        Commands::Info { input } => info_command(&input),
    }
}

fn calibrate(
    input: &[PathBuf],
    output: &std::path::Path,
    geometry_path: &std::path::Path,
    config_path: Option<&std::path::Path>,
    update_gains: Option<&std::path::Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => {
            info!("configuration file: {}", path.display());
            padgain_io::load_config(path)?
        }
        None => CalibConfig::default(),
    };
    let geometry = padgain_io::load_geometry(geometry_path)?;
    info!(
        "geometry: {} channels in {} chamber(s)",
        geometry.channel_count(),
        geometry.chambers.len()
    );

    let mut pass = CalibrationPass::new(config, geometry)?;
    if let Some(path) = update_gains {
        info!("update mode, prior gains from {}", path.display());
        let prior = padgain_io::read_gain_json(path)?;
        pass = pass.with_prior_gains(prior);
    }

    for (index, path) in input.iter().enumerate() {
        info!(
            "processing file {} / {}: {}",
            index + 1,
            input.len(),
            path.display()
        );
        let reader = match EventFileReader::open(path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("skipping unreadable input {}: {e}", path.display());
                continue;
            }
        };
        let group = reader.group();
        for event in reader.events() {
            pass.accumulate(group, &event)?;
        }
    }

    let outcome = pass.run()?;
    let summary = outcome.summary;
    info!(
        "{} / {} events accepted, {} / {} channels estimated, {} valid gains",
        summary.events_accepted,
        summary.events_seen,
        summary.channels_estimated,
        summary.channels_total,
        summary.channels_valid
    );
    if summary.channels_estimated == 0 {
        warn!("no usable channels; every gain in the output is the invalid sentinel");
    }

    let json_path = output.with_extension("gains.json");
    padgain_io::write_gain_json(&json_path, &outcome.gains)?;
    info!("gain table written to {}", json_path.display());

    let xml_path = output.with_extension("gains.xml");
    padgain_io::write_gain_xml_file(&xml_path, &outcome.gains)?;
    info!("XML gain export written to {}", xml_path.display());

    let csv_path = output.with_extension("results.csv");
    let mut csv = BufWriter::new(File::create(&csv_path)?);
    padgain_io::write_results_csv(&mut csv, &outcome.gains, &outcome.responses)?;
    csv.flush()?;
    info!("per-channel results written to {}", csv_path.display());

    Ok(())
}

fn info_command(input: &std::path::Path) -> Result<()> {
    let reader = EventFileReader::open(input)?;
    println!("file:    {}", input.display());
    println!("chamber: {}", reader.chamber());
    println!("sector:  {}", reader.sector());
    println!("events:  {}", reader.event_count());

    let mut total_charge = 0.0f64;
    let mut max_charge = 0.0f64;
    let mut count = 0u64;
    for event in reader.events() {
        total_charge += event.charge;
        max_charge = max_charge.max(event.charge);
        count += 1;
    }
    if count > 0 {
        println!("mean charge: {:.1}", total_charge / count as f64);
        println!("max charge:  {max_charge:.1}");
    }
    Ok(())
}
