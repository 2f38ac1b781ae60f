//! # Proposal Status
//!
//! A proposal is `Pending` until the client accepts it, the acceptance
//! cascade rejects it, or the owning team withdraws it. Every
//! non-pending state is terminal.

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;

/// Lifecycle status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Awaiting the client's decision.
    Pending,
    /// Accepted by the client (terminal).
    Accepted,
    /// Rejected, usually by the acceptance cascade (terminal).
    Rejected,
    /// Withdrawn by the submitting team (terminal).
    Withdrawn,
}

impl Lifecycle for ProposalStatus {
    const MACHINE: &'static str = "proposal";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Rejected, Self::Withdrawn],
            Self::Accepted | Self::Rejected | Self::Withdrawn => &[],
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
