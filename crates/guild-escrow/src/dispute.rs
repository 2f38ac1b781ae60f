//! # Dispute Records
//!
//! A dispute is raised by the client or a team member against a whole
//! contract or against one milestone, and is decided only by platform
//! arbitration. The record keeps the evidence references, the status trail
//! and the final outcome; applying the outcome to milestones and escrow is
//! the caller's job.
//!
//! ## Outcomes
//!
//! | Target    | Outcome              | Effect                          |
//! |-----------|----------------------|---------------------------------|
//! | milestone | `approve_milestone`  | milestone approved, amount paid |
//! | milestone | `reject_milestone`   | milestone rejected              |
//! | milestone | `resume_milestone`   | milestone back to in progress   |
//! | contract  | `dismiss`            | contract flag cleared           |
//! | contract  | `refund`             | escrow refunded                 |

use serde::{Deserialize, Serialize};

use guild_core::{ContractId, DisputeId, MilestoneId, Timestamp, UserId, ValidationError};
use guild_state::{DisputeStatus, Lifecycle, MilestoneResolution, StateTrail, TransitionRecord};

use crate::error::EscrowError;

/// What a dispute is raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum DisputeTarget {
    /// The contract as a whole.
    Contract,
    /// A single milestone of the contract.
    Milestone(MilestoneId),
}

impl DisputeTarget {
    fn label(&self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Milestone(_) => "milestone",
        }
    }
}

/// Arbitration decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// Approve the disputed milestone and pay it.
    ApproveMilestone,
    /// Reject the disputed milestone.
    RejectMilestone,
    /// Send the disputed milestone back to work.
    ResumeMilestone,
    /// Close a contract-level dispute without action.
    Dismiss,
    /// Refund the contract's held escrow.
    Refund,
}

impl DisputeOutcome {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApproveMilestone => "approve_milestone",
            Self::RejectMilestone => "reject_milestone",
            Self::ResumeMilestone => "resume_milestone",
            Self::Dismiss => "dismiss",
            Self::Refund => "refund",
        }
    }

    /// Milestone status this outcome resolves to, for milestone outcomes.
    pub fn milestone_resolution(&self) -> Option<MilestoneResolution> {
        match self {
            Self::ApproveMilestone => Some(MilestoneResolution::Approved),
            Self::RejectMilestone => Some(MilestoneResolution::Rejected),
            Self::ResumeMilestone => Some(MilestoneResolution::InProgress),
            Self::Dismiss | Self::Refund => None,
        }
    }

    fn applies_to(&self, target: &DisputeTarget) -> bool {
        match target {
            DisputeTarget::Milestone(_) => self.milestone_resolution().is_some(),
            DisputeTarget::Contract => self.milestone_resolution().is_none(),
        }
    }
}

impl std::fmt::Display for DisputeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispute and its arbitration trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Dispute identifier.
    pub id: DisputeId,
    /// Contract the dispute belongs to.
    pub contract_id: ContractId,
    /// Contract or milestone under dispute.
    pub target: DisputeTarget,
    /// User who filed it.
    pub raised_by: UserId,
    /// Why it was filed.
    pub reason: String,
    /// Opaque evidence references (storage keys).
    pub evidence: Vec<String>,
    trail: StateTrail<DisputeStatus>,
    /// Arbitrator who picked it up or decided it.
    pub arbitrator: Option<UserId>,
    /// Final decision.
    pub outcome: Option<DisputeOutcome>,
    /// Arbitrator's note.
    pub resolution_note: Option<String>,
    /// When it was filed.
    pub filed_at: Timestamp,
    /// When it was resolved.
    pub resolved_at: Option<Timestamp>,
}

impl Dispute {
    /// File a new dispute in `Open` status.
    ///
    /// # Errors
    ///
    /// [`EscrowError::Validation`] if the reason is blank.
    pub fn file(
        contract_id: ContractId,
        target: DisputeTarget,
        raised_by: UserId,
        reason: &str,
        evidence: Vec<String>,
    ) -> Result<Self, EscrowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::EmptyField("reason").into());
        }
        Ok(Self {
            id: DisputeId::new(),
            contract_id,
            target,
            raised_by,
            reason: reason.to_string(),
            evidence,
            trail: StateTrail::new(DisputeStatus::Open),
            arbitrator: None,
            outcome: None,
            resolution_note: None,
            filed_at: Timestamp::now(),
            resolved_at: None,
        })
    }

    /// Current status.
    pub fn status(&self) -> DisputeStatus {
        self.trail.status()
    }

    /// Whether the dispute still awaits a decision.
    pub fn is_open(&self) -> bool {
        !self.status().is_terminal()
    }

    /// Disputed milestone, if any.
    pub fn milestone_id(&self) -> Option<MilestoneId> {
        match self.target {
            DisputeTarget::Milestone(id) => Some(id),
            DisputeTarget::Contract => None,
        }
    }

    /// Status transitions so far.
    pub fn history(&self) -> &[TransitionRecord<DisputeStatus>] {
        self.trail.history()
    }

    /// An arbitrator takes the case (Open → UnderReview).
    pub fn begin_review(&mut self, arbitrator: UserId) -> Result<(), EscrowError> {
        self.trail
            .advance(DisputeStatus::UnderReview, "arbitrator assigned")?;
        self.arbitrator = Some(arbitrator);
        Ok(())
    }

    /// Check that `outcome` can close this dispute, without changing it.
    pub fn check_resolution(&self, outcome: DisputeOutcome) -> Result<(), EscrowError> {
        if !outcome.applies_to(&self.target) {
            return Err(EscrowError::OutcomeMismatch {
                dispute_id: self.id.to_string(),
                outcome: outcome.as_str().to_string(),
                target: self.target.label().to_string(),
            });
        }
        self.status().transition_to(DisputeStatus::Resolved)?;
        Ok(())
    }

    /// Close the dispute (Open | UnderReview → Resolved).
    ///
    /// # Errors
    ///
    /// [`EscrowError::OutcomeMismatch`] if the outcome does not fit the
    /// target; [`EscrowError::Transition`] if already resolved.
    pub fn resolve(
        &mut self,
        outcome: DisputeOutcome,
        note: Option<String>,
        arbitrator: UserId,
    ) -> Result<(), EscrowError> {
        self.check_resolution(outcome)?;
        self.trail
            .advance(DisputeStatus::Resolved, outcome.as_str())?;
        self.arbitrator = Some(arbitrator);
        self.outcome = Some(outcome);
        self.resolution_note = note;
        self.resolved_at = Some(Timestamp::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milestone_dispute() -> Dispute {
        Dispute::file(
            ContractId::new(),
            DisputeTarget::Milestone(MilestoneId::new()),
            UserId::new(),
            "deliverable incomplete",
            vec!["evidence/screenshot-1.png".into()],
        )
        .unwrap()
    }

    #[test]
    fn file_requires_reason() {
        let err = Dispute::file(
            ContractId::new(),
            DisputeTarget::Contract,
            UserId::new(),
            "   ",
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, EscrowError::Validation(_)));
    }

    #[test]
    fn filed_dispute_is_open() {
        let d = milestone_dispute();
        assert_eq!(d.status(), DisputeStatus::Open);
        assert!(d.is_open());
        assert!(d.milestone_id().is_some());
    }

    #[test]
    fn review_then_resolve() {
        let mut d = milestone_dispute();
        let arb = UserId::new();
        d.begin_review(arb).unwrap();
        d.resolve(DisputeOutcome::ResumeMilestone, Some("redo".into()), arb)
            .unwrap();
        assert_eq!(d.status(), DisputeStatus::Resolved);
        assert_eq!(d.outcome, Some(DisputeOutcome::ResumeMilestone));
        assert!(d.resolved_at.is_some());
        assert_eq!(d.history().len(), 2);
    }

    #[test]
    fn contract_outcome_on_milestone_dispute_rejected() {
        let mut d = milestone_dispute();
        let err = d
            .resolve(DisputeOutcome::Dismiss, None, UserId::new())
            .unwrap_err();
        assert!(matches!(err, EscrowError::OutcomeMismatch { .. }));
        assert!(d.is_open());
    }

    #[test]
    fn milestone_outcome_on_contract_dispute_rejected() {
        let d = Dispute::file(
            ContractId::new(),
            DisputeTarget::Contract,
            UserId::new(),
            "client unresponsive",
            vec![],
        )
        .unwrap();
        assert!(d.check_resolution(DisputeOutcome::ApproveMilestone).is_err());
        assert!(d.check_resolution(DisputeOutcome::Refund).is_ok());
    }

    #[test]
    fn resolved_dispute_cannot_be_resolved_again() {
        let mut d = milestone_dispute();
        let arb = UserId::new();
        d.resolve(DisputeOutcome::RejectMilestone, None, arb).unwrap();
        let err = d
            .resolve(DisputeOutcome::ApproveMilestone, None, arb)
            .unwrap_err();
        assert!(matches!(err, EscrowError::Transition(_)));
        assert_eq!(d.outcome, Some(DisputeOutcome::RejectMilestone));
    }

    #[test]
    fn outcome_maps_to_milestone_resolution() {
        assert_eq!(
            DisputeOutcome::ApproveMilestone.milestone_resolution(),
            Some(MilestoneResolution::Approved)
        );
        assert_eq!(DisputeOutcome::Refund.milestone_resolution(), None);
    }
}
