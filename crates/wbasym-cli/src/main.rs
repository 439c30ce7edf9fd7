//! wbasym CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod inspect;

use wbasym_analysis::{RunConfig, read_settings, run_wb_charge_asymmetry};
use wbasym_event::Histo1D;

#[derive(Parser)]
#[command(name = "wbasym")]
#[command(about = "wbasym - W+b charge asymmetry event loop")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the event loop over one input file
    Run {
        /// Input event table (Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Output tree (Parquet)
        #[arg(short, long)]
        output: PathBuf,

        /// Channel code: 0 (inclusive), 11 (electron), 13 (muon)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        channel: i32,

        /// Charge code: 0 (inclusive), 1, -1
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        charge: i32,

        /// Normalization histogram (JSON); its first bin scales every weight
        #[arg(long)]
        norm: Option<PathBuf>,

        /// Data-taking era, e.g. era2016
        #[arg(long)]
        era: String,

        /// Log every event (raises the log level to debug)
        #[arg(long)]
        debug: bool,

        /// Settings file (YAML, or JSON by extension)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the run summary here instead of stdout (pretty JSON)
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Describe an output tree: schema, row count, metadata, histograms
    Inspect {
        /// Tree file (Parquet)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match &cli.command {
        Commands::Run { debug: true, .. } => cli.log_level.max(tracing::Level::DEBUG),
        _ => cli.log_level,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { input, output, channel, charge, norm, era, debug, config, summary } => {
            cmd_run(RunArgs {
                input,
                output,
                channel,
                charge,
                norm,
                era,
                debug,
                config,
                summary,
            })
        }
        Commands::Inspect { input } => inspect::cmd_inspect(&input),
        Commands::Version => {
            println!("wbasym {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

struct RunArgs {
    input: PathBuf,
    output: PathBuf,
    channel: i32,
    charge: i32,
    norm: Option<PathBuf>,
    era: String,
    debug: bool,
    config: Option<PathBuf>,
    summary: Option<PathBuf>,
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let mut cfg = RunConfig::new(&args.input, &args.output, args.channel, args.charge, &args.era)?
        .with_debug(args.debug);
    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "loading settings");
        let settings = read_settings(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        cfg = cfg.with_settings(settings);
    }

    let norm = match &args.norm {
        Some(path) => Some(
            Histo1D::read_json(path)
                .with_context(|| format!("failed to read normalization {}", path.display()))?,
        ),
        None => None,
    };

    let summary = run_wb_charge_asymmetry(&cfg, norm.as_ref())
        .with_context(|| format!("run over {} failed", args.input.display()))?;

    write_json(args.summary.as_deref(), &serde_json::to_value(&summary)?)
}

pub(crate) fn write_json(output: Option<&Path>, value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{text}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote summary");
        }
        None => println!("{text}"),
    }
    Ok(())
}
