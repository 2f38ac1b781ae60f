//! # Response Views
//!
//! Wire shapes for engine records. Identifiers are bare UUIDs, amounts are
//! integer minor units, and statuses are their snake_case names.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use guild_engine::{
    Contract, Dispute, FeedEntry, Milestone, Project, Proposal, Review, Submission, TeamProfile,
};
use guild_escrow::{DisputeTarget, EscrowTransaction};

/// A project.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectView {
    pub id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Project> for ProjectView {
    fn from(p: Project) -> Self {
        Self {
            id: *p.id.as_uuid(),
            client_id: *p.client_id.as_uuid(),
            title: p.title.clone(),
            budget_min: p.budget.min.minor_units(),
            budget_max: p.budget.max.minor_units(),
            status: p.status().to_string(),
            created_at: *p.created_at.as_datetime(),
        }
    }
}

/// A proposal.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProposalView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub team_id: Uuid,
    pub submitted_by: Uuid,
    pub proposed_budget: i64,
    pub proposed_timeline_weeks: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Proposal> for ProposalView {
    fn from(p: Proposal) -> Self {
        Self {
            id: *p.id.as_uuid(),
            project_id: *p.project_id.as_uuid(),
            team_id: *p.team_id.as_uuid(),
            submitted_by: *p.submitted_by.as_uuid(),
            proposed_budget: p.proposed_budget.minor_units(),
            proposed_timeline_weeks: p.proposed_timeline_weeks,
            status: p.status().to_string(),
            created_at: *p.created_at.as_datetime(),
        }
    }
}

/// One escrow ledger entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionView {
    /// `deposit`, `milestone_release`, `hold`, `hold_release` or `refund`.
    pub transaction_type: String,
    pub amount: i64,
    pub milestone_id: Option<Uuid>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&EscrowTransaction> for TransactionView {
    fn from(t: &EscrowTransaction) -> Self {
        let transaction_type = serde_json::to_value(t.transaction_type)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        Self {
            transaction_type,
            amount: t.amount.minor_units(),
            milestone_id: t.milestone_id.map(|m| *m.as_uuid()),
            reason: t.reason.clone(),
            timestamp: *t.timestamp.as_datetime(),
        }
    }
}

/// Escrow state of a contract.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EscrowView {
    pub total: i64,
    pub released: i64,
    pub held: i64,
    pub status: String,
    pub fee_bps: u32,
    /// Platform fee on the released amount.
    pub platform_fee: i64,
    /// Team payout on the released amount.
    pub team_payout: i64,
    pub transactions: Vec<TransactionView>,
}

impl From<&Contract> for EscrowView {
    fn from(c: &Contract) -> Self {
        let summary = c.escrow().summary();
        Self {
            total: summary.total.minor_units(),
            released: summary.released.minor_units(),
            held: summary.held.minor_units(),
            status: summary.status.to_string(),
            fee_bps: summary.fee_rate.bps(),
            platform_fee: summary.platform_fee.minor_units(),
            team_payout: summary.team_payout.minor_units(),
            transactions: c.escrow().transactions().iter().map(Into::into).collect(),
        }
    }
}

/// A contract with its escrow.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContractView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub proposal_id: Uuid,
    pub team_id: Uuid,
    pub client_id: Uuid,
    pub total_amount: i64,
    pub status: String,
    /// A contract-level dispute is open.
    pub flagged: bool,
    pub escrow: EscrowView,
    pub created_at: DateTime<Utc>,
}

impl From<Contract> for ContractView {
    fn from(c: Contract) -> Self {
        Self {
            escrow: EscrowView::from(&c),
            id: *c.id.as_uuid(),
            project_id: *c.project_id.as_uuid(),
            proposal_id: *c.proposal_id.as_uuid(),
            team_id: *c.team_id.as_uuid(),
            client_id: *c.client_id.as_uuid(),
            total_amount: c.total_amount.minor_units(),
            status: c.status().to_string(),
            flagged: c.flagged,
            created_at: *c.created_at.as_datetime(),
        }
    }
}

/// A milestone.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MilestoneView {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub name: String,
    pub amount: i64,
    pub due_date: Option<NaiveDate>,
    pub order_index: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Milestone> for MilestoneView {
    fn from(m: Milestone) -> Self {
        Self {
            id: *m.id.as_uuid(),
            contract_id: *m.contract_id.as_uuid(),
            status: m.status().to_string(),
            name: m.name,
            amount: m.amount.minor_units(),
            due_date: m.due_date,
            order_index: m.order_index,
            created_at: *m.created_at.as_datetime(),
        }
    }
}

/// A submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmissionView {
    pub id: Uuid,
    pub milestone_id: Uuid,
    pub submitted_by: Uuid,
    pub note: String,
    pub files: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

impl From<Submission> for SubmissionView {
    fn from(s: Submission) -> Self {
        Self {
            id: *s.id.as_uuid(),
            milestone_id: *s.milestone_id.as_uuid(),
            submitted_by: *s.submitted_by.as_uuid(),
            note: s.note,
            files: s.files,
            submitted_at: *s.submitted_at.as_datetime(),
        }
    }
}

/// A review.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewView {
    pub submission_id: Uuid,
    pub milestone_id: Uuid,
    pub reviewer: Uuid,
    pub approved: bool,
    pub note: String,
    pub reviewed_at: DateTime<Utc>,
}

impl From<Review> for ReviewView {
    fn from(r: Review) -> Self {
        Self {
            submission_id: *r.submission_id.as_uuid(),
            milestone_id: *r.milestone_id.as_uuid(),
            reviewer: *r.reviewer.as_uuid(),
            approved: r.approved,
            note: r.note,
            reviewed_at: *r.reviewed_at.as_datetime(),
        }
    }
}

/// A dispute.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisputeView {
    pub id: Uuid,
    pub contract_id: Uuid,
    /// Disputed milestone; absent for contract-level disputes.
    pub milestone_id: Option<Uuid>,
    pub raised_by: Uuid,
    pub reason: String,
    pub evidence: Vec<String>,
    pub status: String,
    pub arbitrator: Option<Uuid>,
    pub outcome: Option<String>,
    pub resolution_note: Option<String>,
    pub filed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<Dispute> for DisputeView {
    fn from(d: Dispute) -> Self {
        let milestone_id = match d.target {
            DisputeTarget::Milestone(m) => Some(*m.as_uuid()),
            DisputeTarget::Contract => None,
        };
        Self {
            id: *d.id.as_uuid(),
            contract_id: *d.contract_id.as_uuid(),
            milestone_id,
            raised_by: *d.raised_by.as_uuid(),
            status: d.status().to_string(),
            reason: d.reason,
            evidence: d.evidence,
            arbitrator: d.arbitrator.map(|a| *a.as_uuid()),
            outcome: d.outcome.map(|o| o.as_str().to_string()),
            resolution_note: d.resolution_note,
            filed_at: *d.filed_at.as_datetime(),
            resolved_at: d.resolved_at.map(|t| *t.as_datetime()),
        }
    }
}

/// A team profile.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamView {
    pub team_id: Uuid,
    pub name: String,
    /// Average rating times 100.
    pub rating: u32,
    pub level: u32,
    pub members: Vec<Uuid>,
}

impl From<TeamProfile> for TeamView {
    fn from(t: TeamProfile) -> Self {
        Self {
            team_id: *t.team_id.as_uuid(),
            name: t.name,
            rating: t.rating,
            level: t.level,
            members: t.members.iter().map(|m| *m.as_uuid()).collect(),
        }
    }
}

/// A change-feed entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventView {
    pub sequence: u64,
    /// Notification topic, e.g. `proposal.accepted`.
    pub topic: String,
    pub recorded_at: DateTime<Utc>,
    /// Event fields, including `topic`.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

impl From<FeedEntry> for EventView {
    fn from(e: FeedEntry) -> Self {
        Self {
            sequence: e.sequence,
            topic: e.event.topic().to_string(),
            recorded_at: *e.recorded_at.as_datetime(),
            payload: serde_json::to_value(&e.event).unwrap_or(serde_json::Value::Null),
        }
    }
}
