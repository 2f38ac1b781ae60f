//! # Engine Events
//!
//! Every committed state change produces one or more [`EngineEvent`]s. The
//! engine hands them to its [`EventSink`] while the store's write guard is
//! still held, so a reader never sees state whose events are missing from
//! the sink and the sink receives events in commit order. Sinks are
//! fire-and-forget: they cannot fail a command, and the engine never
//! retries delivery.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use guild_core::{
    Amount, ContractId, DisputeId, MilestoneId, ProjectId, ProposalId, SubmissionId, TeamId,
    Timestamp,
};
use guild_escrow::DisputeOutcome;

/// A committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic")]
pub enum EngineEvent {
    /// Team submitted a proposal.
    #[serde(rename = "proposal.submitted")]
    ProposalSubmitted {
        /// Project bid on.
        project_id: ProjectId,
        /// New proposal.
        proposal_id: ProposalId,
        /// Bidding team.
        team_id: TeamId,
    },
    /// Team withdrew its proposal.
    #[serde(rename = "proposal.withdrawn")]
    ProposalWithdrawn {
        /// Project bid on.
        project_id: ProjectId,
        /// Withdrawn proposal.
        proposal_id: ProposalId,
        /// Owning team.
        team_id: TeamId,
    },
    /// Client accepted a proposal.
    #[serde(rename = "proposal.accepted")]
    ProposalAccepted {
        /// Project.
        project_id: ProjectId,
        /// Accepted proposal.
        proposal_id: ProposalId,
        /// Winning team.
        team_id: TeamId,
        /// Contract created for it.
        contract_id: ContractId,
    },
    /// Proposal rejected by the acceptance cascade.
    #[serde(rename = "proposal.rejected")]
    ProposalRejected {
        /// Project.
        project_id: ProjectId,
        /// Rejected proposal.
        proposal_id: ProposalId,
        /// Team to notify.
        team_id: TeamId,
    },
    /// Project status changed.
    #[serde(rename = "project.status_changed")]
    ProjectStatusChanged {
        /// Project.
        project_id: ProjectId,
        /// Previous status.
        from: String,
        /// New status.
        to: String,
    },
    /// Contract materialized from an accepted proposal.
    #[serde(rename = "contract.created")]
    ContractCreated {
        /// New contract.
        contract_id: ContractId,
        /// Project.
        project_id: ProjectId,
        /// Contracted team.
        team_id: TeamId,
        /// Contract total.
        total_amount: Amount,
    },
    /// Contract status changed.
    #[serde(rename = "contract.status_changed")]
    ContractStatusChanged {
        /// Contract.
        contract_id: ContractId,
        /// Previous status.
        from: String,
        /// New status.
        to: String,
    },
    /// Milestone appended to a contract.
    #[serde(rename = "milestone.added")]
    MilestoneAdded {
        /// Contract.
        contract_id: ContractId,
        /// New milestone.
        milestone_id: MilestoneId,
        /// Milestone amount.
        amount: Amount,
    },
    /// Team started work on a milestone.
    #[serde(rename = "milestone.started")]
    MilestoneStarted {
        /// Contract.
        contract_id: ContractId,
        /// Milestone.
        milestone_id: MilestoneId,
    },
    /// Team submitted a result.
    #[serde(rename = "milestone.submitted")]
    MilestoneSubmitted {
        /// Contract.
        contract_id: ContractId,
        /// Milestone.
        milestone_id: MilestoneId,
        /// New submission.
        submission_id: SubmissionId,
    },
    /// Client reviewed a submission.
    #[serde(rename = "milestone.reviewed")]
    MilestoneReviewed {
        /// Contract.
        contract_id: ContractId,
        /// Milestone.
        milestone_id: MilestoneId,
        /// Review decision.
        approved: bool,
    },
    /// Client funded escrow.
    #[serde(rename = "escrow.funded")]
    EscrowFunded {
        /// Contract.
        contract_id: ContractId,
        /// Deposit.
        amount: Amount,
    },
    /// Escrow frozen.
    #[serde(rename = "escrow.held")]
    EscrowHeld {
        /// Contract.
        contract_id: ContractId,
    },
    /// Escrow freeze lifted.
    #[serde(rename = "escrow.hold_released")]
    EscrowHoldReleased {
        /// Contract.
        contract_id: ContractId,
    },
    /// Milestone amount released to the team.
    #[serde(rename = "escrow.milestone_released")]
    EscrowMilestoneReleased {
        /// Contract.
        contract_id: ContractId,
        /// Paid milestone.
        milestone_id: MilestoneId,
        /// Released amount.
        amount: Amount,
    },
    /// Entire escrow paid out.
    #[serde(rename = "escrow.released")]
    EscrowReleased {
        /// Contract.
        contract_id: ContractId,
        /// Contract total.
        total_amount: Amount,
    },
    /// Held balance returned to the client.
    #[serde(rename = "escrow.refunded")]
    EscrowRefunded {
        /// Contract.
        contract_id: ContractId,
        /// Refunded amount.
        amount: Amount,
    },
    /// Dispute filed.
    #[serde(rename = "dispute.filed")]
    DisputeFiled {
        /// New dispute.
        dispute_id: DisputeId,
        /// Contract.
        contract_id: ContractId,
        /// Disputed milestone, if any.
        milestone_id: Option<MilestoneId>,
    },
    /// Arbitrator picked up a dispute.
    #[serde(rename = "dispute.under_review")]
    DisputeUnderReview {
        /// Dispute.
        dispute_id: DisputeId,
        /// Contract.
        contract_id: ContractId,
    },
    /// Dispute decided.
    #[serde(rename = "dispute.resolved")]
    DisputeResolved {
        /// Dispute.
        dispute_id: DisputeId,
        /// Contract.
        contract_id: ContractId,
        /// Decision.
        outcome: DisputeOutcome,
    },
}

impl EngineEvent {
    /// Notification topic, e.g. `proposal.accepted`.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::ProposalSubmitted { .. } => "proposal.submitted",
            Self::ProposalWithdrawn { .. } => "proposal.withdrawn",
            Self::ProposalAccepted { .. } => "proposal.accepted",
            Self::ProposalRejected { .. } => "proposal.rejected",
            Self::ProjectStatusChanged { .. } => "project.status_changed",
            Self::ContractCreated { .. } => "contract.created",
            Self::ContractStatusChanged { .. } => "contract.status_changed",
            Self::MilestoneAdded { .. } => "milestone.added",
            Self::MilestoneStarted { .. } => "milestone.started",
            Self::MilestoneSubmitted { .. } => "milestone.submitted",
            Self::MilestoneReviewed { .. } => "milestone.reviewed",
            Self::EscrowFunded { .. } => "escrow.funded",
            Self::EscrowHeld { .. } => "escrow.held",
            Self::EscrowHoldReleased { .. } => "escrow.hold_released",
            Self::EscrowMilestoneReleased { .. } => "escrow.milestone_released",
            Self::EscrowReleased { .. } => "escrow.released",
            Self::EscrowRefunded { .. } => "escrow.refunded",
            Self::DisputeFiled { .. } => "dispute.filed",
            Self::DisputeUnderReview { .. } => "dispute.under_review",
            Self::DisputeResolved { .. } => "dispute.resolved",
        }
    }
}

/// Receiver of engine events.
///
/// `publish` runs inside the engine's write section. An implementation must
/// not call back into the [`Engine`](crate::Engine); doing so deadlocks.
pub trait EventSink: Send + Sync {
    /// Accept one event. Must not block on delivery.
    fn publish(&self, event: &EngineEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &EngineEvent) {
        tracing::info!(topic = event.topic(), ?event, "engine event");
    }
}

/// An event with its position in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Monotonic sequence number, starting at 1.
    pub sequence: u64,
    /// When the event was recorded.
    pub recorded_at: Timestamp,
    /// The event.
    pub event: EngineEvent,
}

#[derive(Debug, Default)]
struct FeedInner {
    next_sequence: u64,
    entries: VecDeque<FeedEntry>,
}

/// Bounded in-memory change feed with sequence numbers.
///
/// When full, the oldest entries are dropped; consumers that fall behind
/// further than `capacity` events miss them.
#[derive(Debug)]
pub struct EventFeed {
    capacity: usize,
    inner: Mutex<FeedInner>,
}

impl EventFeed {
    /// A feed keeping the most recent `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(FeedInner::default()),
        }
    }

    /// Entries with a sequence number greater than `after`, oldest first.
    pub fn since(&self, after: u64) -> Vec<FeedEntry> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.sequence > after)
            .cloned()
            .collect()
    }

    /// Topics of every retained entry, oldest first.
    pub fn topics(&self) -> Vec<&'static str> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|e| e.event.topic())
            .collect()
    }

    /// Sequence number of the most recent entry (0 if none).
    pub fn last_sequence(&self) -> u64 {
        self.inner.lock().next_sequence
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl EventSink for EventFeed {
    fn publish(&self, event: &EngineEvent) {
        let mut inner = self.inner.lock();
        inner.next_sequence += 1;
        let entry = FeedEntry {
            sequence: inner.next_sequence,
            recorded_at: Timestamp::now(),
            event: event.clone(),
        };
        inner.entries.push_back(entry);
        while inner.entries.len() > self.capacity {
            inner.entries.pop_front();
        }
    }
}

/// Delivers each event to every inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    /// Empty fan-out (drops events).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventSink for FanoutSink {
    fn publish(&self, event: &EngineEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}
