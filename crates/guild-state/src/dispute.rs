//! # Dispute Status

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;

/// Lifecycle status of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Filed, awaiting an arbitrator.
    Open,
    /// An arbitrator has picked it up.
    UnderReview,
    /// Decided (terminal).
    Resolved,
}

impl Lifecycle for DisputeStatus {
    const MACHINE: &'static str = "dispute";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::UnderReview => "under_review",
            Self::Resolved => "resolved",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Open => &[Self::UnderReview, Self::Resolved],
            Self::UnderReview => &[Self::Resolved],
            Self::Resolved => &[],
        }
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_can_resolve_without_review() {
        assert_eq!(
            DisputeStatus::Open.transition_to(DisputeStatus::Resolved),
            Ok(DisputeStatus::Resolved)
        );
    }

    #[test]
    fn under_review_cannot_reopen() {
        assert!(DisputeStatus::UnderReview
            .transition_to(DisputeStatus::Open)
            .is_err());
    }
}
