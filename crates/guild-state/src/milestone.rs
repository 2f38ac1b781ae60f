//! # Milestone Status
//!
//! ```text
//! Pending ──start──▶ InProgress ──submit──▶ Review ──approve──▶ Approved (terminal)
//!                                  ▲          │
//!                                  │        reject
//!                                  │          ▼
//!                                  └─submit── Rejected
//!
//! Pending | InProgress | Review | Rejected ──raise dispute──▶ Dispute
//! Dispute ──resolve──▶ Approved | Rejected | InProgress
//! ```
//!
//! Milestones are driven by [`MilestoneTrigger`]s rather than raw target
//! states, so callers name the business event and the table decides the
//! outcome. A milestone already in `Dispute` cannot be disputed again.

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::lifecycle::Lifecycle;

/// Lifecycle status of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    /// Not started.
    Pending,
    /// Team is working on it.
    InProgress,
    /// Submitted, awaiting the client's review.
    Review,
    /// Approved and paid (terminal).
    Approved,
    /// Sent back by the client; the team must resubmit.
    Rejected,
    /// Frozen pending arbitration.
    Dispute,
}

/// Post-dispute status chosen by arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneResolution {
    /// Work accepted; the milestone is paid.
    Approved,
    /// Work rejected; the team must resubmit.
    Rejected,
    /// Work resumes.
    InProgress,
}

impl MilestoneResolution {
    /// The milestone status this resolution leads to.
    pub fn target(&self) -> MilestoneStatus {
        match self {
            Self::Approved => MilestoneStatus::Approved,
            Self::Rejected => MilestoneStatus::Rejected,
            Self::InProgress => MilestoneStatus::InProgress,
        }
    }
}

/// A business event that moves a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "trigger", content = "resolution")]
pub enum MilestoneTrigger {
    /// Team starts work.
    Start,
    /// Team submits a result.
    Submit,
    /// Client approves the submission.
    Approve,
    /// Client rejects the submission.
    Reject,
    /// Client or team raises a dispute.
    RaiseDispute,
    /// Arbitration resolves the dispute.
    Resolve(MilestoneResolution),
}

impl MilestoneTrigger {
    /// Short name for logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RaiseDispute => "raise_dispute",
            Self::Resolve(_) => "resolve",
        }
    }
}

impl Lifecycle for MilestoneStatus {
    const MACHINE: &'static str = "milestone";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Dispute => "dispute",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Dispute],
            Self::InProgress => &[Self::Review, Self::Dispute],
            Self::Review => &[Self::Approved, Self::Rejected, Self::Dispute],
            Self::Rejected => &[Self::Review, Self::Dispute],
            Self::Dispute => &[Self::Approved, Self::Rejected, Self::InProgress],
            Self::Approved => &[],
        }
    }
}

impl MilestoneStatus {
    /// Apply a trigger, returning the next status.
    ///
    /// Any trigger not in the table yields [`TransitionError`]; `self` is
    /// never modified.
    pub fn apply(self, trigger: MilestoneTrigger) -> Result<MilestoneStatus, TransitionError> {
        use MilestoneStatus::*;
        use MilestoneTrigger as T;

        let next = match (self, trigger) {
            (Pending, T::Start) => InProgress,
            (InProgress, T::Submit) | (Rejected, T::Submit) => Review,
            (Review, T::Approve) => Approved,
            (Review, T::Reject) => Rejected,
            (Pending | InProgress | Review | Rejected, T::RaiseDispute) => Dispute,
            (Dispute, T::Resolve(resolution)) => resolution.target(),
            (Approved, _) => {
                return Err(TransitionError::TerminalState {
                    machine: Self::MACHINE,
                    state: self.as_str().to_string(),
                })
            }
            _ => {
                return Err(TransitionError::InvalidTransition {
                    machine: Self::MACHINE,
                    from: self.as_str().to_string(),
                    attempted: trigger.as_str().to_string(),
                })
            }
        };
        Ok(next)
    }

    /// Whether the team may submit work in this status.
    pub fn accepts_submission(&self) -> bool {
        matches!(self, Self::InProgress | Self::Rejected)
    }
}

impl std::fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn happy_path() {
        let s = MilestoneStatus::Pending;
        let s = s.apply(MilestoneTrigger::Start).unwrap();
        assert_eq!(s, MilestoneStatus::InProgress);
        let s = s.apply(MilestoneTrigger::Submit).unwrap();
        assert_eq!(s, MilestoneStatus::Review);
        let s = s.apply(MilestoneTrigger::Approve).unwrap();
        assert_eq!(s, MilestoneStatus::Approved);
    }

    #[test]
    fn resubmission_after_rejection_goes_to_review() {
        let s = MilestoneStatus::Review
            .apply(MilestoneTrigger::Reject)
            .unwrap();
        assert_eq!(s, MilestoneStatus::Rejected);
        assert_eq!(
            s.apply(MilestoneTrigger::Submit).unwrap(),
            MilestoneStatus::Review
        );
    }

    #[test]
    fn approved_is_terminal() {
        let err = MilestoneStatus::Approved
            .apply(MilestoneTrigger::RaiseDispute)
            .unwrap_err();
        assert!(matches!(err, TransitionError::TerminalState { .. }));
    }

    #[test]
    fn pending_cannot_be_approved() {
        let err = MilestoneStatus::Pending
            .apply(MilestoneTrigger::Approve)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                machine: "milestone",
                from: "pending".into(),
                attempted: "approve".into(),
            }
        );
    }

    #[test]
    fn dispute_cannot_be_disputed_again() {
        assert!(MilestoneStatus::Dispute
            .apply(MilestoneTrigger::RaiseDispute)
            .is_err());
    }

    #[test]
    fn dispute_resolutions() {
        for (resolution, expected) in [
            (MilestoneResolution::Approved, MilestoneStatus::Approved),
            (MilestoneResolution::Rejected, MilestoneStatus::Rejected),
            (MilestoneResolution::InProgress, MilestoneStatus::InProgress),
        ] {
            assert_eq!(
                MilestoneStatus::Dispute
                    .apply(MilestoneTrigger::Resolve(resolution))
                    .unwrap(),
                expected
            );
        }
    }

    #[test]
    fn resolve_outside_dispute_rejected() {
        assert!(MilestoneStatus::Review
            .apply(MilestoneTrigger::Resolve(MilestoneResolution::Approved))
            .is_err());
    }

    fn any_status() -> impl Strategy<Value = MilestoneStatus> {
        prop_oneof![
            Just(MilestoneStatus::Pending),
            Just(MilestoneStatus::InProgress),
            Just(MilestoneStatus::Review),
            Just(MilestoneStatus::Approved),
            Just(MilestoneStatus::Rejected),
            Just(MilestoneStatus::Dispute),
        ]
    }

    fn any_trigger() -> impl Strategy<Value = MilestoneTrigger> {
        prop_oneof![
            Just(MilestoneTrigger::Start),
            Just(MilestoneTrigger::Submit),
            Just(MilestoneTrigger::Approve),
            Just(MilestoneTrigger::Reject),
            Just(MilestoneTrigger::RaiseDispute),
            Just(MilestoneTrigger::Resolve(MilestoneResolution::Approved)),
            Just(MilestoneTrigger::Resolve(MilestoneResolution::Rejected)),
            Just(MilestoneTrigger::Resolve(MilestoneResolution::InProgress)),
        ]
    }

    proptest! {
        #[test]
        fn every_successful_trigger_is_in_the_table(
            from in any_status(),
            trigger in any_trigger(),
        ) {
            if let Ok(to) = from.apply(trigger) {
                prop_assert!(from.can_transition_to(to));
            }
        }
    }
}
