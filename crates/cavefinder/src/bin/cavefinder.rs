//! # Cavefinder
//!
//! Searches a seed range or list for seeds whose noise at one location
//! looks like a cave system, writing every match to a text file.
//!
//! ```bash
//! # Scan 100k structure seeds around (120, -340)
//! cavefinder scan --start 0 --end 99999 -x 120 -z -340
//!
//! # Start from a config file, stop after ten minutes
//! cavefinder scan --config scan.toml --duration 600
//!
//! # Print the default configuration
//! cavefinder defaults > scan.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use cavefinder::{drive, succeeded, summary, ConfigError, ScanConfig, ScanOverrides, SeedConfig};
use cavefinder_core::{HeightCheck, Scanner, SeedKind};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "cavefinder", version)]
#[command(about = "Search seed ranges for cave-friendly noise at a fixed location")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scan
    #[command(allow_negative_numbers = true)]
    Scan(ScanArgs),
    /// Print the default configuration as TOML
    Defaults,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// First seed of the range
    #[arg(long, requires = "end", conflicts_with = "list")]
    start: Option<i64>,

    /// Last seed of the range (inclusive)
    #[arg(long, requires = "start")]
    end: Option<i64>,

    /// File with one seed per line
    #[arg(long)]
    list: Option<PathBuf>,

    /// Seed kind of the input
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Block X coordinate
    #[arg(short = 'x', long = "x")]
    x: Option<i32>,

    /// Block Z coordinate
    #[arg(short = 'z', long = "z")]
    z: Option<i32>,

    /// Lowest cave layer: -50, -40, -30, -20, -10 or 0
    #[arg(long)]
    depth: Option<i32>,

    /// Worker threads (defaults to host parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Seeds per range segment
    #[arg(long)]
    segment_size: Option<u64>,

    /// Use the fixed bedrock-impossible signature
    #[arg(long)]
    bedrock_impossible: bool,

    /// Only count the large entrance layer
    #[arg(long)]
    entrance1_only: bool,

    /// Second-stage height check
    #[arg(long, value_enum)]
    height_check: Option<HeightArg>,

    /// Result file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Replace an existing result file
    #[arg(long)]
    overwrite: bool,

    /// Cancel the scan after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Debug logging unless RUST_LOG is set
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    /// Structure seeds, each standing for 65536 world seeds
    Structure,
    /// World seeds, used directly
    World,
}

impl From<KindArg> for SeedKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Structure => Self::Compressed,
            KindArg::World => Self::Full,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HeightArg {
    Surface,
    Underwater,
    RangeMin,
    RangeAvg,
    RangeMax,
}

impl From<HeightArg> for HeightCheck {
    fn from(kind: HeightArg) -> Self {
        match kind {
            HeightArg::Surface => Self::Surface,
            HeightArg::Underwater => Self::Underwater,
            HeightArg::RangeMin => Self::RangeMin,
            HeightArg::RangeAvg => Self::RangeAvg,
            HeightArg::RangeMax => Self::RangeMax,
        }
    }
}

impl ScanArgs {
    fn overrides(&self) -> ScanOverrides {
        let seeds = match (self.start, self.end, &self.list) {
            (Some(start), Some(end), _) => Some(SeedConfig::Range { start, end }),
            (_, _, Some(path)) => Some(SeedConfig::List {
                path: Some(path.clone()),
                seeds: None,
            }),
            _ => None,
        };
        ScanOverrides {
            seeds,
            kind: self.kind.map(SeedKind::from),
            x: self.x,
            z: self.z,
            depth_floor: self.depth,
            threads: self.threads,
            segment_size: self.segment_size,
            bedrock_impossible: self.bedrock_impossible,
            entrance1_only: self.entrance1_only,
            height_check: self.height_check.map(HeightCheck::from),
            output: self.output.clone(),
            overwrite: self.overwrite,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn scan(args: &ScanArgs) -> Result<bool, ConfigError> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    config.apply(args.overrides())?;

    let request = config.to_request()?;
    let services = config.services();
    let handle = Scanner::start(request, services)?;
    info!(output = %config.output.display(), "Writing matches");

    let report = drive(handle, args.duration.map(Duration::from_secs), |snapshot| {
        eprintln!("{snapshot}");
    });
    eprintln!("{}", summary(&report));
    Ok(succeeded(&report))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Defaults => match ScanConfig::defaults_toml() {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
        Command::Scan(args) => {
            init_logging(args.verbose);
            match scan(&args) {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => ExitCode::FAILURE,
                Err(err) => {
                    error!(%err, "Scan not started");
                    eprintln!("error: {err}");
                    ExitCode::from(2)
                }
            }
        }
    }
}
