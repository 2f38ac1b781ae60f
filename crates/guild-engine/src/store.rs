//! # Engine Store
//!
//! All tables live behind one `parking_lot::RwLock`. Reads take a shared
//! guard; commands stage their changes on cloned records and commit them
//! with [`Store::transact`], which runs under a single write guard. A
//! command's closure validates everything before it writes anything, so a
//! failed closure leaves the tables untouched and readers never observe a
//! half-applied command.
//!
//! Commands that emit events commit through [`Store::commit`], which hands
//! the events to the sink before the write guard drops. A reader that sees
//! a committed change therefore finds its events already published, and
//! the sink receives events in commit order. The store lock is never held
//! across a per-entity [`KeyedLocks`] wait.
//!
//! [`KeyedLocks`]: crate::locks::KeyedLocks

use std::collections::HashMap;

use parking_lot::RwLock;

use guild_core::{ContractId, DisputeId, MilestoneId, ProjectId, ProposalId};
use guild_escrow::Dispute;

use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink};
use crate::records::{Contract, Milestone, Project, Proposal, Review, Submission};

/// The engine's tables and their secondary indexes.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    pub projects: HashMap<ProjectId, Project>,
    pub proposals: HashMap<ProposalId, Proposal>,
    pub contracts: HashMap<ContractId, Contract>,
    pub milestones: HashMap<MilestoneId, Milestone>,
    pub disputes: HashMap<DisputeId, Dispute>,
    /// Append-only, oldest first.
    pub submissions: HashMap<MilestoneId, Vec<Submission>>,
    /// Append-only, oldest first.
    pub reviews: HashMap<MilestoneId, Vec<Review>>,
    /// Accepted proposal → its contract.
    pub acceptances: HashMap<ProposalId, ContractId>,
    /// Proposals per project in submission order.
    pub project_proposals: HashMap<ProjectId, Vec<ProposalId>>,
    /// Milestones per contract in order_index order.
    pub contract_milestones: HashMap<ContractId, Vec<MilestoneId>>,
    /// Disputes per contract in filing order.
    pub contract_disputes: HashMap<ContractId, Vec<DisputeId>>,
}

impl Tables {
    pub fn project(&self, id: &ProjectId) -> Result<&Project, EngineError> {
        self.projects
            .get(id)
            .ok_or_else(|| EngineError::not_found("project", id))
    }

    pub fn proposal(&self, id: &ProposalId) -> Result<&Proposal, EngineError> {
        self.proposals
            .get(id)
            .ok_or_else(|| EngineError::not_found("proposal", id))
    }

    pub fn contract(&self, id: &ContractId) -> Result<&Contract, EngineError> {
        self.contracts
            .get(id)
            .ok_or_else(|| EngineError::not_found("contract", id))
    }

    pub fn milestone(&self, id: &MilestoneId) -> Result<&Milestone, EngineError> {
        self.milestones
            .get(id)
            .ok_or_else(|| EngineError::not_found("milestone", id))
    }

    pub fn dispute(&self, id: &DisputeId) -> Result<&Dispute, EngineError> {
        self.disputes
            .get(id)
            .ok_or_else(|| EngineError::not_found("dispute", id))
    }

    /// Proposals of a project in submission order.
    pub fn proposals_of(&self, project_id: &ProjectId) -> Vec<&Proposal> {
        self.project_proposals
            .get(project_id)
            .map(|ids| ids.iter().filter_map(|id| self.proposals.get(id)).collect())
            .unwrap_or_default()
    }

    /// Milestones of a contract by order_index.
    pub fn milestones_of(&self, contract_id: &ContractId) -> Vec<&Milestone> {
        self.contract_milestones
            .get(contract_id)
            .map(|ids| ids.iter().filter_map(|id| self.milestones.get(id)).collect())
            .unwrap_or_default()
    }

    /// Disputes of a contract in filing order.
    pub fn disputes_of(&self, contract_id: &ContractId) -> Vec<&Dispute> {
        self.contract_disputes
            .get(contract_id)
            .map(|ids| ids.iter().filter_map(|id| self.disputes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn put_project(&mut self, project: Project) {
        self.projects.insert(project.id, project);
    }

    pub fn put_proposal(&mut self, proposal: Proposal) {
        let ids = self.project_proposals.entry(proposal.project_id).or_default();
        if !ids.contains(&proposal.id) {
            ids.push(proposal.id);
        }
        self.proposals.insert(proposal.id, proposal);
    }

    pub fn put_contract(&mut self, contract: Contract) {
        self.acceptances.insert(contract.proposal_id, contract.id);
        self.contracts.insert(contract.id, contract);
    }

    pub fn put_milestone(&mut self, milestone: Milestone) {
        let ids = self
            .contract_milestones
            .entry(milestone.contract_id)
            .or_default();
        if !ids.contains(&milestone.id) {
            ids.push(milestone.id);
        }
        self.milestones.insert(milestone.id, milestone);
    }

    pub fn put_dispute(&mut self, dispute: Dispute) {
        let ids = self.contract_disputes.entry(dispute.contract_id).or_default();
        if !ids.contains(&dispute.id) {
            ids.push(dispute.id);
        }
        self.disputes.insert(dispute.id, dispute);
    }

    pub fn append_submission(&mut self, submission: Submission) {
        self.submissions
            .entry(submission.milestone_id)
            .or_default()
            .push(submission);
    }

    pub fn append_review(&mut self, review: Review) {
        self.reviews.entry(review.milestone_id).or_default().push(review);
    }
}

/// Thread-safe holder of the engine tables.
///
/// `parking_lot::RwLock` is non-poisoning: a panicking writer does not
/// permanently wedge the engine.
#[derive(Debug, Default)]
pub(crate) struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    pub fn new(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Run `f` against a shared view of the tables.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.read())
    }

    /// Atomically read-validate-commit.
    ///
    /// The closure runs under a single write guard. It must finish all
    /// validation before its first write so that an `Err` leaves the tables
    /// as they were.
    pub fn transact<R, E>(&self, f: impl FnOnce(&mut Tables) -> Result<R, E>) -> Result<R, E> {
        f(&mut self.tables.write())
    }

    /// [`Store::transact`] for commands that emit events.
    ///
    /// The closure returns its result together with the events describing
    /// the change. On success the events go to `sink` while the write guard
    /// is still held; on failure nothing is written and nothing published.
    pub fn commit<R, E>(
        &self,
        sink: &dyn EventSink,
        f: impl FnOnce(&mut Tables) -> Result<(R, Vec<EngineEvent>), E>,
    ) -> Result<R, E> {
        let mut tables = self.tables.write();
        let (result, events) = f(&mut tables)?;
        for event in &events {
            sink.publish(event);
        }
        drop(tables);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use parking_lot::Mutex;

    use super::*;
    use crate::events::EventFeed;

    /// Records, for each event, whether a reader could have got in.
    #[derive(Default)]
    struct Witness {
        store: OnceLock<Arc<Store>>,
        readable: Mutex<Vec<bool>>,
    }

    impl EventSink for Witness {
        fn publish(&self, _event: &EngineEvent) {
            let readable = self
                .store
                .get()
                .map_or(true, |store| store.tables.try_read().is_some());
            self.readable.lock().push(readable);
        }
    }

    fn held(contract_id: ContractId) -> EngineEvent {
        EngineEvent::EscrowHeld { contract_id }
    }

    #[test]
    fn commit_publishes_before_releasing_the_guard() {
        let store = Arc::new(Store::default());
        let witness = Witness::default();
        let _ = witness.store.set(store.clone());

        let contract = ContractId::new();
        store
            .commit(&witness, |_| Ok::<_, EngineError>(((), vec![held(contract), held(contract)])))
            .unwrap();

        assert_eq!(*witness.readable.lock(), vec![false, false]);
        assert!(store.tables.try_read().is_some());
    }

    #[test]
    fn failed_commit_publishes_nothing() {
        let store = Store::default();
        let feed = EventFeed::default();
        let err = store
            .commit(&feed, |_| -> Result<((), Vec<EngineEvent>), EngineError> {
                Err(EngineError::Validation("rejected".into()))
            })
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(feed.last_sequence(), 0);
    }
}
