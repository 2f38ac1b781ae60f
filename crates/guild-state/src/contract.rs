//! # Contract Status
//!
//! `Draft` on creation, `Active` once escrow is funded, `Completed` when
//! escrow is fully released, `Terminated` when escrow is refunded.

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;

/// Lifecycle status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// Created from an accepted proposal, escrow not funded.
    Draft,
    /// Escrow funded; milestones can progress.
    Active,
    /// Every milestone paid out (terminal).
    Completed,
    /// Ended by refund (terminal).
    Terminated,
}

impl Lifecycle for ContractStatus {
    const MACHINE: &'static str = "contract";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Active, Self::Terminated],
            Self::Active => &[Self::Completed, Self::Terminated],
            Self::Completed | Self::Terminated => &[],
        }
    }
}

impl ContractStatus {
    /// Whether milestones may still be appended.
    pub fn is_open_for_milestones(&self) -> bool {
        matches!(self, Self::Draft | Self::Active)
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
