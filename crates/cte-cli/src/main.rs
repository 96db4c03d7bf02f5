//! ctecorr - pixel-based CTE correction driver
//!
//! Runs the correction engine on raw little-endian `f32` column-major
//! buffers with YAML parameter bundles.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "ctecorr")]
#[command(author, version, about = "Pixel-based CCD charge transfer efficiency correction")]
#[command(long_about = "
Adds or removes CCD charge transfer trails on raw image buffers.

Images are raw little-endian f32 in column-major order (each column of
--rows pixels stored contiguously, row 0 nearest the readout register).

Examples:
  ctecorr correct raw.f32 -p uvis.yaml --rows 2048 --columns 4096 -o fixed.f32
  ctecorr correct raw.f32 -p uvis.yaml -r 2048 -c 4096 -o fixed.f32 --trail trail.f32
  ctecorr simulate clean.f32 -p uvis.yaml -r 2048 -c 4096 -o trailed.f32
  ctecorr smooth raw.f32 --rn-amp 3.25 -r 2048 -c 4096 -o smooth.f32
  ctecorr trap-map -p uvis.yaml -r 2048 -c 4096 -o traps.f32
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove CTE trails from an observed image
    #[command(visible_alias = "c")]
    Correct(CorrectArgs),

    /// Add CTE trails to a clean image
    #[command(visible_alias = "sim")]
    Simulate(SimulateArgs),

    /// Read-noise smoothing only
    Smooth(SmoothArgs),

    /// Write the trap pixel map for the given geometry
    #[command(name = "trap-map", visible_alias = "tm")]
    TrapMap(TrapMapArgs),
}

/// Image geometry shared by all subcommands.
#[derive(Args, Clone, Copy)]
struct Geometry {
    /// Rows per column
    #[arg(short, long)]
    rows: usize,

    /// Number of columns
    #[arg(short, long)]
    columns: usize,
}

#[derive(Args)]
struct CorrectArgs {
    /// Observed image (raw f32)
    input: PathBuf,

    /// Corrected image output
    #[arg(short, long)]
    output: PathBuf,

    /// Parameter bundle (YAML)
    #[arg(short, long)]
    params: PathBuf,

    #[command(flatten)]
    geometry: Geometry,

    /// Also write the applied trail correction
    #[arg(long)]
    trail: Option<PathBuf>,

    /// Override the read-noise amplitude
    #[arg(long)]
    rn_amp: Option<f64>,

    /// Disable readout cosmic-ray mitigation
    #[arg(long)]
    no_rocr: bool,

    /// Exposure start (MJD); with --date0/--date1 derives scale_frac
    #[arg(long, requires_all = ["date0", "date1"])]
    expstart: Option<f64>,

    /// Reference date of zero trap growth (MJD)
    #[arg(long, requires = "expstart")]
    date0: Option<f64>,

    /// Reference date of full trap growth (MJD)
    #[arg(long, requires = "expstart")]
    date1: Option<f64>,
}

#[derive(Args)]
struct SimulateArgs {
    /// Clean image (raw f32)
    input: PathBuf,

    /// Trailed image output
    #[arg(short, long)]
    output: PathBuf,

    /// Parameter bundle (YAML)
    #[arg(short, long)]
    params: PathBuf,

    #[command(flatten)]
    geometry: Geometry,

    /// Trap pixel map (raw f32) instead of building one from the scales
    #[arg(long)]
    trap_map: Option<PathBuf>,
}

#[derive(Args)]
struct SmoothArgs {
    /// Input image (raw f32)
    input: PathBuf,

    /// Smoothed image output
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    geometry: Geometry,

    /// Read-noise amplitude
    #[arg(long, default_value = "3.25")]
    rn_amp: f64,
}

#[derive(Args)]
struct TrapMapArgs {
    /// Trap map output (raw f32)
    #[arg(short, long)]
    output: PathBuf,

    /// Parameter bundle (YAML)
    #[arg(short, long)]
    params: PathBuf,

    #[command(flatten)]
    geometry: Geometry,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Correct(args) => commands::correct::run(args, cli.verbose),
        Commands::Simulate(args) => commands::simulate::run(args, cli.verbose),
        Commands::Smooth(args) => commands::smooth::run(args, cli.verbose),
        Commands::TrapMap(args) => commands::trap_map::run(args, cli.verbose),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const CORRECT: [&str; 10] = [
        "ctecorr", "correct", "raw.f32", "-o", "out.f32", "-p", "p.yaml", "-r", "8", "-c",
    ];

    fn parse_correct(extra: &[&str]) -> Result<CorrectArgs, clap::Error> {
        let args = CORRECT.iter().chain(&["4"]).chain(extra).copied();
        match Cli::try_parse_from(args)?.command {
            Commands::Correct(args) => Ok(args),
            _ => panic!("parsed into another subcommand"),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dates_need_expstart() {
        for extra in [&["--date0", "55000"][..], &["--date1", "56000"][..]] {
            let err = parse_correct(extra).err().unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        }
        let err = parse_correct(&["--date0", "55000", "--date1", "56000"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_expstart_needs_both_dates() {
        let err = parse_correct(&["--expstart", "55500", "--date0", "55000"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_time_scaling_args_parse() {
        let args = parse_correct(&["--expstart", "55500", "--date0", "55000", "--date1", "56000"])
            .unwrap();
        assert_eq!(args.expstart, Some(55500.0));
        assert_eq!(args.date0, Some(55000.0));
        assert_eq!(args.date1, Some(56000.0));

        let args = parse_correct(&[]).unwrap();
        assert_eq!(args.geometry.rows, 8);
        assert_eq!(args.geometry.columns, 4);
        assert!(args.expstart.is_none() && args.date0.is_none() && args.date1.is_none());
    }
}
