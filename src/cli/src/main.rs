//! Keel CLI - run the resilience core's computations over local files.
//!
//! Provides commands for event replay, gap detection, backoff schedules,
//! quorum evaluation, breaker simulation, and configuration inspection.

mod commands;
mod input;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{backoff, breaker, config, gaps, quorum, replay};
use keel_core::telemetry::{init_logging, LogFormat, LoggingConfig};
use output::OutputFormat;

/// Keel - resilience and coordination core CLI
#[derive(Parser)]
#[command(
    name = "keel",
    version,
    about = "Keel - resilience and coordination core",
    long_about = "Offline tool for replaying event batches, scanning for sequence gaps, \
                  planning retries, evaluating votes and simulating circuit breakers.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "KEEL_CONFIG")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log core decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an event batch onto a base snapshot
    Replay(replay::ReplayArgs),

    /// Detect missing sequence numbers in a stream
    Gaps(gaps::GapsArgs),

    /// Print a retry delay schedule
    Backoff(backoff::BackoffArgs),

    /// Evaluate a set of votes
    Quorum(quorum::QuorumArgs),

    /// Circuit breaker tools
    #[command(subcommand)]
    Breaker(breaker::BreakerCommands),

    /// Configuration inspection
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.verbose {
        init_logging(&LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            stderr: true,
            ..LoggingConfig::default()
        })?;
    }

    let settings = config::load(cli.config.as_deref())?;
    let format = cli.output;

    match cli.command {
        Commands::Replay(args) => replay::execute(args, &settings, format),
        Commands::Gaps(args) => gaps::execute(args, &settings, format),
        Commands::Backoff(args) => backoff::execute(args, &settings, format),
        Commands::Quorum(args) => quorum::execute(args, &settings, format),
        Commands::Breaker(cmd) => breaker::execute(cmd, &settings, format),
        Commands::Config(cmd) => config::execute(cmd, &settings, format),
    }
}
