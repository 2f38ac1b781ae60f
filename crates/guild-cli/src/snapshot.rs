//! # Snapshot Subcommand
//!
//! Loads an engine snapshot (as written by `guild run --snapshot`) and
//! restores it into an engine, which rejects dangling references and broken
//! escrow accounting.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use guild_engine::{Engine, EngineSnapshot, FanoutSink, GuildConfig, InMemoryTeamDirectory};

/// Arguments for the `guild snapshot` subcommand.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

/// Snapshot subcommands.
#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Restore a snapshot and report what it holds.
    Check {
        /// Snapshot file (JSON).
        path: PathBuf,
    },
}

/// Read a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<EngineSnapshot> {
    let raw =
        std::fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
}

/// Execute the snapshot subcommand.
pub fn run_snapshot(args: &SnapshotArgs, config: Option<&GuildConfig>) -> Result<u8> {
    match &args.command {
        SnapshotCommand::Check { path } => {
            let snapshot = load_snapshot(path)?;
            let counts = (
                snapshot.projects.len(),
                snapshot.contracts.len(),
                snapshot.milestones.len(),
                snapshot.disputes.len(),
            );
            let engine_config = config.map(|c| c.engine.clone()).unwrap_or_default();
            match Engine::restore(
                engine_config,
                snapshot,
                Arc::new(FanoutSink::new()),
                Arc::new(InMemoryTeamDirectory::new()),
            ) {
                Ok(_) => {
                    println!(
                        "OK: {} ({} projects, {} contracts, {} milestones, {} disputes)",
                        path.display(),
                        counts.0,
                        counts.1,
                        counts.2,
                        counts.3
                    );
                    Ok(0)
                }
                Err(e) => {
                    println!("FAIL: {}: {e}", path.display());
                    Ok(1)
                }
            }
        }
    }
}
