//! # Service Bootstrap
//!
//! Reads the service configuration at startup and builds [`AppState`].
//!
//! 1. **Load config**: parse the YAML named by `GUILD_CONFIG` and collect
//!    every problem with it.
//! 2. **Seed directory**: register the configured teams.
//! 3. **Build state**: engine, change feed, optional database pool.
//!
//! If `GUILD_CONFIG` is unset the server starts with default engine
//! tunables and an empty team directory.

use std::path::Path;
use std::sync::Arc;

use guild_engine::{GuildConfig, InMemoryTeamDirectory};

use crate::state::{AppConfig, AppState};

/// Errors during bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Config file not found at the given path.
    #[error("config file not found: {path}")]
    ConfigNotFound {
        /// Path that was looked up.
        path: String,
    },

    /// Config file failed to parse or validate.
    #[error("invalid config: {errors:?}")]
    InvalidConfig {
        /// Every problem found.
        errors: Vec<String>,
    },

    /// IO error reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load and validate a service config file.
pub fn load_config(path: &Path) -> Result<GuildConfig, BootstrapError> {
    if !path.exists() {
        return Err(BootstrapError::ConfigNotFound {
            path: path.display().to_string(),
        });
    }
    let raw = std::fs::read_to_string(path)?;
    parse_config(&raw)
}

/// Parse and validate service config YAML.
pub fn parse_config(raw: &str) -> Result<GuildConfig, BootstrapError> {
    let config: GuildConfig =
        serde_yaml::from_str(raw).map_err(|e| BootstrapError::InvalidConfig {
            errors: vec![e.to_string()],
        })?;
    let errors = config.problems();
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(BootstrapError::InvalidConfig { errors })
    }
}

/// Build application state from `GUILD_CONFIG` (if set) and `config`.
///
/// The file's engine tunables and feed size replace the ones in `config`;
/// port and auth token always come from `config`.
pub fn bootstrap(
    mut config: AppConfig,
    db_pool: Option<sqlx::PgPool>,
) -> Result<AppState, BootstrapError> {
    let directory = Arc::new(InMemoryTeamDirectory::new());

    match std::env::var("GUILD_CONFIG").ok() {
        Some(path) => {
            let file = load_config(Path::new(&path))?;
            config.engine = file.engine;
            config.feed_capacity = file.feed_capacity;
            let team_count = file.teams.len();
            for team in file.teams {
                directory.upsert(team);
            }
            tracing::info!(
                path = %path,
                teams = team_count,
                lock_timeout_ms = config.engine.lock_timeout_ms,
                platform_fee_bps = config.engine.platform_fee_bps,
                "Loaded service config"
            );
        }
        None => {
            tracing::info!("GUILD_CONFIG not set, starting with defaults and no teams");
        }
    }

    AppState::try_with_config(config, directory, db_pool).map_err(|e| {
        BootstrapError::InvalidConfig {
            errors: vec![e.to_string()],
        }
    })
}
