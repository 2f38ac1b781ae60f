//! # guild-cli — Guild Engine Command-Line Interface
//!
//! Offline tooling around the engagement engine.
//!
//! ## Subcommands
//!
//! - `run` — Replay a YAML scenario against a fresh engine and report the
//!   resulting contracts, optionally saving the engine snapshot.
//! - `config check` — Validate a service configuration file.
//! - `snapshot check` — Load a snapshot and verify its integrity.
//!
//! Handlers return the process exit code; argument parsing lives in
//! `main.rs`.

pub mod config;
pub mod scenario;
pub mod snapshot;
