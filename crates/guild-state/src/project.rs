//! # Project Status
//!
//! ```text
//! Open ──▶ Negotiating ──▶ InProgress ──▶ Completed
//!   │          │   │            │
//!   │          │   └─▶ Matched ─┤
//!   └──────────┴────────────────┴──▶ Cancelled
//! ```
//!
//! `Completed` and `Cancelled` are terminal.

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Accepting proposals.
    Open,
    /// A proposal has been accepted; contract not yet funded.
    Negotiating,
    /// Terms settled with the team outside the engine.
    Matched,
    /// Escrow funded, work under way.
    InProgress,
    /// All milestones paid out (terminal).
    Completed,
    /// Abandoned or refunded (terminal).
    Cancelled,
}

impl Lifecycle for ProjectStatus {
    const MACHINE: &'static str = "project";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Negotiating => "negotiating",
            Self::Matched => "matched",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Open => &[Self::Negotiating, Self::Cancelled],
            Self::Negotiating => &[Self::Matched, Self::InProgress, Self::Cancelled],
            Self::Matched => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }
}

impl ProjectStatus {
    /// Whether proposals may be accepted in this status.
    pub fn accepts_acceptance(&self) -> bool {
        matches!(self, Self::Open | Self::Negotiating)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
