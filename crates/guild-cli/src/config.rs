//! # Config Subcommand
//!
//! Validates the YAML file the API server reads from `GUILD_CONFIG`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use guild_engine::GuildConfig;

/// Arguments for the `guild config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Parse a configuration file and report every problem in it.
    Check {
        /// Path to the YAML file.
        path: PathBuf,
    },
}

/// Read and parse a configuration file.
pub fn load_config(path: &Path) -> Result<GuildConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs) -> Result<u8> {
    match &args.command {
        ConfigCommand::Check { path } => {
            let config = load_config(path)?;
            let problems = config.problems();
            if problems.is_empty() {
                println!(
                    "OK: {} (lock timeout {} ms, fee {} bps, {} teams)",
                    path.display(),
                    config.engine.lock_timeout_ms,
                    config.engine.platform_fee_bps,
                    config.teams.len()
                );
                return Ok(0);
            }
            for problem in &problems {
                println!("  - {problem}");
            }
            println!("FAIL: {} has {} problem(s)", path.display(), problems.len());
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn check(path: &Path) -> Result<u8> {
        run_config(&ConfigArgs {
            command: ConfigCommand::Check {
                path: path.to_path_buf(),
            },
        })
    }

    #[test]
    fn valid_config_passes() {
        let file = write_temp("engine:\n  lock_timeout_ms: 100\nfeed_capacity: 10\n");
        assert_eq!(check(file.path()).unwrap(), 0);
    }

    #[test]
    fn problems_fail_with_exit_code_one() {
        let file = write_temp("engine:\n  platform_fee_bps: 20000\nfeed_capacity: 0\n");
        assert_eq!(check(file.path()).unwrap(), 1);
    }

    #[test]
    fn unparseable_config_is_an_error() {
        let file = write_temp("engine: [not, a, map]\n");
        let err = check(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(check(Path::new("/nonexistent/guild.yaml")).is_err());
    }
}
