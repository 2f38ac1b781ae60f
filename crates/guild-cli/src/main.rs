//! # guild CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use guild_cli::config::{load_config, run_config, ConfigArgs};
use guild_cli::scenario::{run_scenario, RunArgs};
use guild_cli::snapshot::{run_snapshot, SnapshotArgs};

/// Guild marketplace engine toolchain.
///
/// Replays engagement scenarios against an in-process engine, validates
/// service configuration, and verifies engine snapshots.
#[derive(Parser, Debug)]
#[command(name = "guild", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Service configuration file supplying engine tunables and seed teams.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a YAML scenario and print the resulting contracts.
    Run(RunArgs),

    /// Service configuration checks.
    Config(ConfigArgs),

    /// Engine snapshot checks.
    Snapshot(SnapshotArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match cli.config.as_deref().map(load_config).transpose() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Run(args) => run_scenario(&args, config.as_ref()),
        Commands::Config(args) => run_config(&args),
        Commands::Snapshot(args) => run_snapshot(&args, config.as_ref()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
