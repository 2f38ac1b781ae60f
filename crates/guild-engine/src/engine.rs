//! # Engine
//!
//! [`Engine`] owns the tables, the per-entity locks, the event sink and the
//! team directory. Commands are implemented in the component modules
//! (`proposals`, `acceptance`, `milestones`, `submissions`, `escrow`,
//! `disputes`); this module holds construction and the read-side queries.
//!
//! The engine is `Send + Sync` and meant to be shared behind an `Arc` by
//! stateless request handlers.

use std::sync::Arc;

use guild_core::{
    Amount, ContractId, DisputeId, FeeRate, MilestoneId, ProjectId, ProposalId, Timestamp,
};
use guild_escrow::{Dispute, EscrowSummary};

use crate::config::EngineConfig;
use crate::directory::{InMemoryTeamDirectory, TeamDirectory};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink, FanoutSink};
use crate::locks::{KeyGuard, KeyedLocks};
use crate::records::{Contract, Milestone, Project, Proposal, Review, Submission};
use crate::store::{Store, Tables};

/// The marketplace engagement engine.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) fee_rate: FeeRate,
    pub(crate) contract_ceiling: Option<Amount>,
    pub(crate) store: Store,
    project_locks: KeyedLocks<ProjectId>,
    contract_locks: KeyedLocks<ContractId>,
    milestone_locks: KeyedLocks<MilestoneId>,
    sink: Arc<dyn EventSink>,
    directory: Arc<dyn TeamDirectory>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an empty engine.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn new(
        config: EngineConfig,
        sink: Arc<dyn EventSink>,
        directory: Arc<dyn TeamDirectory>,
    ) -> Result<Self, EngineError> {
        Self::with_tables(config, sink, directory, Tables::default())
    }

    /// Engine with default config, no event sink and an empty directory.
    pub fn in_memory() -> Self {
        Self::with_defaults(
            Arc::new(FanoutSink::new()),
            Arc::new(InMemoryTeamDirectory::new()),
        )
    }

    /// Empty engine with default config and the given collaborators.
    pub fn with_defaults(sink: Arc<dyn EventSink>, directory: Arc<dyn TeamDirectory>) -> Self {
        Self {
            config: EngineConfig::default(),
            fee_rate: FeeRate::default(),
            contract_ceiling: None,
            store: Store::default(),
            project_locks: KeyedLocks::new("project"),
            contract_locks: KeyedLocks::new("contract"),
            milestone_locks: KeyedLocks::new("milestone"),
            sink,
            directory,
        }
    }

    pub(crate) fn with_tables(
        config: EngineConfig,
        sink: Arc<dyn EventSink>,
        directory: Arc<dyn TeamDirectory>,
        tables: Tables,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let fee_rate = config.fee_rate()?;
        let contract_ceiling = config.contract_ceiling()?;
        Ok(Self {
            config,
            fee_rate,
            contract_ceiling,
            store: Store::new(tables),
            project_locks: KeyedLocks::new("project"),
            contract_locks: KeyedLocks::new("contract"),
            milestone_locks: KeyedLocks::new("milestone"),
            sink,
            directory,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The team directory used for membership and ranking.
    pub fn directory(&self) -> &Arc<dyn TeamDirectory> {
        &self.directory
    }

    pub(crate) fn lock_project(&self, id: ProjectId) -> Result<KeyGuard<'_, ProjectId>, EngineError> {
        self.project_locks.acquire(id, self.config.lock_timeout())
    }

    pub(crate) fn lock_contract(
        &self,
        id: ContractId,
    ) -> Result<KeyGuard<'_, ContractId>, EngineError> {
        self.contract_locks.acquire(id, self.config.lock_timeout())
    }

    pub(crate) fn lock_milestone(
        &self,
        id: MilestoneId,
    ) -> Result<KeyGuard<'_, MilestoneId>, EngineError> {
        self.milestone_locks.acquire(id, self.config.lock_timeout())
    }

    /// Commit a command and publish its events under the store write guard.
    pub(crate) fn commit<R, E>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<(R, Vec<EngineEvent>), E>,
    ) -> Result<R, E> {
        self.store.commit(self.sink.as_ref(), f)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Look up a project.
    pub fn get_project(&self, id: &ProjectId) -> Result<Project, EngineError> {
        self.store.read(|t| t.project(id).cloned())
    }

    /// All projects.
    pub fn list_projects(&self) -> Vec<Project> {
        self.store.read(|t| {
            let mut projects: Vec<Project> = t.projects.values().cloned().collect();
            projects.sort_by_key(|p| (p.created_at, p.id));
            projects
        })
    }

    /// Look up a proposal.
    pub fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, EngineError> {
        self.store.read(|t| t.proposal(id).cloned())
    }

    /// Look up a contract.
    pub fn get_contract(&self, id: &ContractId) -> Result<Contract, EngineError> {
        self.store.read(|t| t.contract(id).cloned())
    }

    /// The contract created for an accepted proposal, if any.
    pub fn contract_for_proposal(&self, proposal_id: &ProposalId) -> Option<Contract> {
        self.store.read(|t| {
            t.acceptances
                .get(proposal_id)
                .and_then(|cid| t.contracts.get(cid))
                .cloned()
        })
    }

    /// Contracts of a project.
    pub fn contracts_of_project(&self, project_id: &ProjectId) -> Vec<Contract> {
        self.store.read(|t| {
            t.contracts
                .values()
                .filter(|c| &c.project_id == project_id)
                .cloned()
                .collect()
        })
    }

    /// Look up a milestone.
    pub fn get_milestone(&self, id: &MilestoneId) -> Result<Milestone, EngineError> {
        self.store.read(|t| t.milestone(id).cloned())
    }

    /// Milestones of a contract ordered by `order_index`.
    pub fn list_milestones(&self, contract_id: &ContractId) -> Result<Vec<Milestone>, EngineError> {
        self.store.read(|t| {
            t.contract(contract_id)?;
            Ok(t.milestones_of(contract_id).into_iter().cloned().collect())
        })
    }

    /// Submissions of a milestone, most recent first.
    pub fn list_submissions(
        &self,
        milestone_id: &MilestoneId,
    ) -> Result<Vec<Submission>, EngineError> {
        self.store.read(|t| {
            t.milestone(milestone_id)?;
            Ok(t.submissions
                .get(milestone_id)
                .map(|subs| subs.iter().rev().cloned().collect())
                .unwrap_or_default())
        })
    }

    /// Reviews of a milestone, most recent first.
    pub fn list_reviews(&self, milestone_id: &MilestoneId) -> Result<Vec<Review>, EngineError> {
        self.store.read(|t| {
            t.milestone(milestone_id)?;
            Ok(t.reviews
                .get(milestone_id)
                .map(|reviews| reviews.iter().rev().cloned().collect())
                .unwrap_or_default())
        })
    }

    /// `{total, released, held, status}` plus fee breakdown.
    pub fn get_escrow_summary(&self, contract_id: &ContractId) -> Result<EscrowSummary, EngineError> {
        self.store
            .read(|t| t.contract(contract_id).map(|c| c.escrow.summary()))
    }

    /// Look up a dispute.
    pub fn get_dispute(&self, id: &DisputeId) -> Result<Dispute, EngineError> {
        self.store.read(|t| t.dispute(id).cloned())
    }

    /// Disputes of a contract in filing order.
    pub fn list_disputes(&self, contract_id: &ContractId) -> Result<Vec<Dispute>, EngineError> {
        self.store.read(|t| {
            t.contract(contract_id)?;
            Ok(t.disputes_of(contract_id).into_iter().cloned().collect())
        })
    }

    /// Unresolved disputes filed at least `older_than` ago, oldest first.
    ///
    /// The engine never escalates on its own; the host polls this to drive
    /// its escalation path.
    pub fn list_open_disputes(&self, older_than: chrono::Duration) -> Vec<Dispute> {
        let now = Timestamp::now();
        self.store.read(|t| {
            let mut open: Vec<Dispute> = t
                .disputes
                .values()
                .filter(|d| d.is_open() && d.filed_at.elapsed_until(now) >= older_than)
                .cloned()
                .collect();
            open.sort_by_key(|d| d.filed_at);
            open
        })
    }
}
