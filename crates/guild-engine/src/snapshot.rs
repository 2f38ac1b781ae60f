//! # Snapshot and Restore
//!
//! A serializable copy of every table, used to hydrate the engine from the
//! database at startup and by the CLI to persist scenario runs. Restoring
//! checks referential integrity and the escrow invariants before any
//! command can see the data.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use guild_core::{Amount, ProjectId};
use guild_escrow::Dispute;

use crate::config::EngineConfig;
use crate::directory::TeamDirectory;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::EventSink;
use crate::records::{Contract, Milestone, Project, Proposal, Review, Submission};
use crate::store::Tables;

/// Every table of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Projects.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Proposals.
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    /// Contracts with their escrow accounts.
    #[serde(default)]
    pub contracts: Vec<Contract>,
    /// Milestones.
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    /// Submissions, oldest first.
    #[serde(default)]
    pub submissions: Vec<Submission>,
    /// Reviews, oldest first.
    #[serde(default)]
    pub reviews: Vec<Review>,
    /// Disputes.
    #[serde(default)]
    pub disputes: Vec<Dispute>,
}

fn broken(what: impl Into<String>) -> EngineError {
    EngineError::Validation(format!("snapshot integrity: {}", what.into()))
}

impl EngineSnapshot {
    /// Build indexed tables, rejecting dangling references and broken
    /// escrow accounting. Child lists keep the order they have in the
    /// snapshot; milestones are ordered by `order_index`.
    pub(crate) fn into_tables(mut self) -> Result<Tables, EngineError> {
        let mut t = Tables::default();

        for project in self.projects {
            t.put_project(project);
        }

        for proposal in self.proposals {
            if !t.projects.contains_key(&proposal.project_id) {
                return Err(broken(format!(
                    "proposal {} references unknown project {}",
                    proposal.id, proposal.project_id
                )));
            }
            t.put_proposal(proposal);
        }

        let mut accepted_projects = HashSet::new();
        for contract in self.contracts {
            let proposal = t.proposals.get(&contract.proposal_id).ok_or_else(|| {
                broken(format!(
                    "contract {} references unknown proposal {}",
                    contract.id, contract.proposal_id
                ))
            })?;
            if proposal.project_id != contract.project_id {
                return Err(broken(format!(
                    "contract {} and its proposal disagree on the project",
                    contract.id
                )));
            }
            if !accepted_projects.insert(contract.project_id) {
                return Err(broken(format!(
                    "project {} has more than one contract",
                    contract.project_id
                )));
            }
            if contract.escrow.total != contract.total_amount {
                return Err(broken(format!(
                    "contract {} escrow total differs from the contract total",
                    contract.id
                )));
            }
            contract.escrow.check_invariants()?;
            t.put_contract(contract);
        }

        self.milestones
            .sort_by_key(|m| (m.contract_id, m.order_index));
        for milestone in self.milestones {
            if !t.contracts.contains_key(&milestone.contract_id) {
                return Err(broken(format!(
                    "milestone {} references unknown contract {}",
                    milestone.id, milestone.contract_id
                )));
            }
            t.put_milestone(milestone);
        }
        for (contract_id, contract) in &t.contracts {
            let allocated = Amount::try_sum(t.milestones_of(contract_id).iter().map(|m| m.amount))?;
            if allocated > contract.total_amount {
                return Err(broken(format!(
                    "milestones of contract {contract_id} allocate {allocated} of {}",
                    contract.total_amount
                )));
            }
        }

        for submission in self.submissions {
            if !t.milestones.contains_key(&submission.milestone_id) {
                return Err(broken(format!(
                    "submission {} references unknown milestone {}",
                    submission.id, submission.milestone_id
                )));
            }
            t.append_submission(submission);
        }

        for review in self.reviews {
            if !t.milestones.contains_key(&review.milestone_id) {
                return Err(broken(format!(
                    "review of {} references unknown milestone {}",
                    review.submission_id, review.milestone_id
                )));
            }
            t.append_review(review);
        }

        for dispute in self.disputes {
            if !t.contracts.contains_key(&dispute.contract_id) {
                return Err(broken(format!(
                    "dispute {} references unknown contract {}",
                    dispute.id, dispute.contract_id
                )));
            }
            if let Some(mid) = dispute.milestone_id() {
                if t.milestones.get(&mid).map(|m| m.contract_id) != Some(dispute.contract_id) {
                    return Err(broken(format!(
                        "dispute {} references milestone {mid} outside its contract",
                        dispute.id
                    )));
                }
            }
            t.put_dispute(dispute);
        }

        Ok(t)
    }
}

fn collect(t: &Tables, scope: Option<&ProjectId>) -> EngineSnapshot {
    let mut snapshot = EngineSnapshot::default();
    let mut projects: Vec<&Project> = t
        .projects
        .values()
        .filter(|p| scope.map_or(true, |id| &p.id == id))
        .collect();
    projects.sort_by_key(|p| (p.created_at, p.id));
    for project in projects {
        snapshot.projects.push(project.clone());
        snapshot
            .proposals
            .extend(t.proposals_of(&project.id).into_iter().cloned());
    }

    let mut contracts: Vec<&Contract> = t
        .contracts
        .values()
        .filter(|c| scope.map_or(true, |id| &c.project_id == id))
        .collect();
    contracts.sort_by_key(|c| (c.created_at, c.id));
    for contract in contracts {
        snapshot.contracts.push(contract.clone());
        for milestone in t.milestones_of(&contract.id) {
            snapshot.milestones.push(milestone.clone());
            if let Some(subs) = t.submissions.get(&milestone.id) {
                snapshot.submissions.extend(subs.iter().cloned());
            }
            if let Some(reviews) = t.reviews.get(&milestone.id) {
                snapshot.reviews.extend(reviews.iter().cloned());
            }
        }
        snapshot
            .disputes
            .extend(t.disputes_of(&contract.id).into_iter().cloned());
    }
    snapshot
}

impl Engine {
    /// Copy every table, children in their index order.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.store.read(|t| collect(t, None))
    }

    /// Copy one project and everything hanging off it.
    ///
    /// Used for write-through persistence after a command touching the
    /// project.
    pub fn project_snapshot(&self, project_id: &ProjectId) -> Result<EngineSnapshot, EngineError> {
        self.store.read(|t| {
            t.project(project_id)?;
            Ok(collect(t, Some(project_id)))
        })
    }

    /// Build an engine from a snapshot.
    ///
    /// # Errors
    ///
    /// `Validation` if the snapshot has dangling references or broken
    /// escrow accounting; config errors as in [`Engine::new`].
    pub fn restore(
        config: EngineConfig,
        snapshot: EngineSnapshot,
        sink: Arc<dyn EventSink>,
        directory: Arc<dyn TeamDirectory>,
    ) -> Result<Self, EngineError> {
        let counts = (
            snapshot.projects.len(),
            snapshot.contracts.len(),
            snapshot.disputes.len(),
        );
        let tables = snapshot.into_tables()?;
        tracing::info!(
            projects = counts.0,
            contracts = counts.1,
            disputes = counts.2,
            "engine restored from snapshot"
        );
        Self::with_tables(config, sink, directory, tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryTeamDirectory;
    use crate::events::FanoutSink;
    use crate::records::MilestoneDraft;
    use guild_core::{Actor, BudgetRange, TeamId, UserId};
    use guild_state::{EscrowStatus, MilestoneStatus};

    fn busy_engine() -> Engine {
        let engine = Engine::in_memory();
        let client = Actor::user(UserId::new());
        let team = TeamId::new();
        let member = Actor::user(UserId::new()).with_team(team);
        let project = engine
            .register_project("Snap", BudgetRange::new(1, 3_000).unwrap(), &client)
            .unwrap()
            .id;
        let p = engine.submit_proposal(project, team, 3_000, 2, &member).unwrap();
        let contract = engine
            .accept_proposal_with_plan(
                project,
                p.id,
                &[MilestoneDraft::new("A", 1_000), MilestoneDraft::new("B", 2_000)],
                &client,
            )
            .unwrap();
        engine.fund_escrow(contract.id, 3_000, &client).unwrap();
        let a = engine.list_milestones(&contract.id).unwrap()[0].id;
        engine.start_milestone(a, &member).unwrap();
        engine.submit_milestone(a, "v1", vec![], &member).unwrap();
        engine.review_milestone(a, true, "ok", &client).unwrap();
        engine
    }

    fn restore(snapshot: EngineSnapshot) -> Result<Engine, EngineError> {
        Engine::restore(
            EngineConfig::default(),
            snapshot,
            Arc::new(FanoutSink::new()),
            Arc::new(InMemoryTeamDirectory::new()),
        )
    }

    #[test]
    fn restore_reproduces_state() {
        let original = busy_engine();
        let snapshot = original.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = restore(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.snapshot(), snapshot);

        let contract = &snapshot.contracts[0];
        let summary = restored.get_escrow_summary(&contract.id).unwrap();
        assert_eq!(summary.status, EscrowStatus::Funded);
        assert_eq!(summary.released.minor_units(), 1_000);
        let ms = restored.list_milestones(&contract.id).unwrap();
        assert_eq!(ms[0].status(), MilestoneStatus::Approved);
        assert_eq!(ms[1].order_index, 1);
    }

    #[test]
    fn project_snapshot_is_scoped() {
        let engine = busy_engine();
        let other = engine
            .register_project(
                "Other",
                BudgetRange::new(1, 10).unwrap(),
                &Actor::user(UserId::new()),
            )
            .unwrap();
        let full = engine.snapshot();
        assert_eq!(full.projects.len(), 2);

        let scoped = engine.project_snapshot(&other.id).unwrap();
        assert_eq!(scoped.projects, vec![other]);
        assert!(scoped.contracts.is_empty());

        let busy = full.projects.iter().find(|p| p.title == "Snap").unwrap();
        let scoped = engine.project_snapshot(&busy.id).unwrap();
        assert_eq!(scoped.contracts.len(), 1);
        assert_eq!(scoped.milestones.len(), 2);
        assert_eq!(scoped.reviews.len(), 1);
    }

    #[test]
    fn dangling_milestone_rejected() {
        let mut snapshot = busy_engine().snapshot();
        snapshot.contracts.clear();
        snapshot.disputes.clear();
        let err = restore(snapshot).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn over_allocated_ledger_rejected() {
        let mut snapshot = busy_engine().snapshot();
        let mut extra = snapshot.milestones[1].clone();
        extra.id = guild_core::MilestoneId::new();
        extra.order_index = 2;
        snapshot.milestones.push(extra);
        let err = restore(snapshot).unwrap_err();
        assert!(err.to_string().contains("allocate"));
    }
}
