//! # Engine Records
//!
//! The five persisted tables plus the append-only submission and review
//! logs. Status fields are [`StateTrail`]s so every record carries its own
//! transition history; they can only be moved through the engine's
//! commands.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use guild_core::{
    Amount, BudgetRange, ContractId, FeeRate, MilestoneId, ProjectId, ProposalId, SubmissionId,
    TeamId, Timestamp, UserId,
};
use guild_escrow::EscrowAccount;
use guild_state::{
    ContractStatus, EscrowStatus, MilestoneStatus, ProjectStatus, ProposalStatus, StateTrail,
    TransitionRecord,
};

/// A client's project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub id: ProjectId,
    /// Owning client.
    pub client_id: UserId,
    /// Short title.
    pub title: String,
    /// Advertised budget.
    pub budget: BudgetRange,
    pub(crate) trail: StateTrail<ProjectStatus>,
    /// When it was posted.
    pub created_at: Timestamp,
}

impl Project {
    /// Current status.
    pub fn status(&self) -> ProjectStatus {
        self.trail.status()
    }

    /// Status transitions so far.
    pub fn history(&self) -> &[TransitionRecord<ProjectStatus>] {
        self.trail.history()
    }
}

/// A team's bid on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal identifier.
    pub id: ProposalId,
    /// Project bid on.
    pub project_id: ProjectId,
    /// Bidding team.
    pub team_id: TeamId,
    /// Team member who submitted it.
    pub submitted_by: UserId,
    /// Proposed total price.
    pub proposed_budget: Amount,
    /// Proposed duration.
    pub proposed_timeline_weeks: u32,
    pub(crate) trail: StateTrail<ProposalStatus>,
    /// When it was submitted.
    pub created_at: Timestamp,
}

impl Proposal {
    /// Current status.
    pub fn status(&self) -> ProposalStatus {
        self.trail.status()
    }
}

/// A contract materialized from an accepted proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Contract identifier.
    pub id: ContractId,
    /// Project.
    pub project_id: ProjectId,
    /// The accepted proposal (1:1).
    pub proposal_id: ProposalId,
    /// Contracted team.
    pub team_id: TeamId,
    /// Paying client.
    pub client_id: UserId,
    /// Contract total, equal to the accepted proposal's budget.
    pub total_amount: Amount,
    /// Platform fee rate.
    pub fee_rate: FeeRate,
    pub(crate) trail: StateTrail<ContractStatus>,
    pub(crate) escrow: EscrowAccount,
    /// Whether a contract-level dispute is open.
    pub flagged: bool,
    /// When it was created.
    pub created_at: Timestamp,
}

impl Contract {
    /// Current status.
    pub fn status(&self) -> ContractStatus {
        self.trail.status()
    }

    /// Current escrow status.
    pub fn escrow_status(&self) -> EscrowStatus {
        self.escrow.status()
    }

    /// The escrow account.
    pub fn escrow(&self) -> &EscrowAccount {
        &self.escrow
    }

    /// Status transitions so far.
    pub fn history(&self) -> &[TransitionRecord<ContractStatus>] {
        self.trail.history()
    }
}

/// A separately payable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Milestone identifier.
    pub id: MilestoneId,
    /// Owning contract.
    pub contract_id: ContractId,
    /// Display name.
    pub name: String,
    /// Payout on approval.
    pub amount: Amount,
    /// Target date.
    pub due_date: Option<NaiveDate>,
    /// Display position within the contract.
    pub order_index: u32,
    pub(crate) trail: StateTrail<MilestoneStatus>,
    /// When it was added.
    pub created_at: Timestamp,
}

impl Milestone {
    /// Current status.
    pub fn status(&self) -> MilestoneStatus {
        self.trail.status()
    }

    /// Status transitions so far.
    pub fn history(&self) -> &[TransitionRecord<MilestoneStatus>] {
        self.trail.history()
    }
}

/// A negotiated milestone, before it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDraft {
    /// Display name.
    pub name: String,
    /// Payout on approval, minor units.
    pub amount: i64,
    /// Target date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl MilestoneDraft {
    /// Draft without a due date.
    pub fn new(name: impl Into<String>, amount: i64) -> Self {
        Self {
            name: name.into(),
            amount,
            due_date: None,
        }
    }
}

/// A result submitted against a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Submission identifier.
    pub id: SubmissionId,
    /// Milestone.
    pub milestone_id: MilestoneId,
    /// Team member who submitted.
    pub submitted_by: UserId,
    /// When it was submitted.
    pub submitted_at: Timestamp,
    /// Free-form note.
    pub note: String,
    /// Opaque file references.
    pub files: Vec<String>,
}

/// The client's decision on a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Submission reviewed (the latest at review time).
    pub submission_id: SubmissionId,
    /// Milestone.
    pub milestone_id: MilestoneId,
    /// Reviewing client.
    pub reviewer: UserId,
    /// Decision.
    pub approved: bool,
    /// Reviewer's note.
    pub note: String,
    /// When the review was recorded.
    pub reviewed_at: Timestamp,
}
