//! # Engine Configuration
//!
//! Tunables for lock acquisition and contract materialization. Loaded from
//! the `engine:` section of the service YAML or built with [`Default`].
//! [`GuildConfig`] is the whole file: engine tunables, the event feed size
//! and the seed team directory.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use guild_core::{Amount, FeeRate, ValidationError};

use crate::directory::TeamProfile;

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a command waits for a per-entity lock before failing with
    /// `Conflict`.
    pub lock_timeout_ms: u64,
    /// Platform fee charged on payouts, in basis points.
    pub platform_fee_bps: u32,
    /// Upper bound on a contract's total amount, if any.
    pub max_contract_amount: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            platform_fee_bps: 1_000,
            max_contract_amount: None,
        }
    }
}

impl EngineConfig {
    /// Lock acquisition timeout.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Platform fee as a validated rate.
    pub fn fee_rate(&self) -> Result<FeeRate, ValidationError> {
        FeeRate::from_bps(self.platform_fee_bps)
    }

    /// Contract ceiling as a validated amount.
    pub fn contract_ceiling(&self) -> Result<Option<Amount>, ValidationError> {
        self.max_contract_amount.map(Amount::positive).transpose()
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lock_timeout_ms == 0 {
            return Err(ValidationError::ZeroCount("lock_timeout_ms"));
        }
        self.fee_rate()?;
        self.contract_ceiling()?;
        Ok(())
    }
}

/// A service configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Engine tunables.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Number of events the change feed retains.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
    /// Teams to seed the directory with.
    #[serde(default)]
    pub teams: Vec<TeamProfile>,
}

fn default_feed_capacity() -> usize {
    10_000
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            feed_capacity: default_feed_capacity(),
            teams: Vec::new(),
        }
    }
}

impl GuildConfig {
    /// Every problem with the file, empty if it is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Err(e) = self.engine.validate() {
            problems.push(format!("engine: {e}"));
        }
        if self.feed_capacity == 0 {
            problems.push("feed_capacity must be at least 1".to_string());
        }
        let mut seen = HashSet::new();
        for team in &self.teams {
            if !seen.insert(team.team_id) {
                problems.push(format!("team {} listed twice", team.team_id));
            }
            if team.name.trim().is_empty() {
                problems.push(format!("team {} has an empty name", team.team_id));
            }
        }
        problems
    }
}
