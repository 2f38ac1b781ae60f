//! # DisputeHandler
//!
//! Either party may raise a dispute against the whole contract or one of
//! its milestones. A milestone dispute moves the milestone to `dispute`
//! and freezes its review; other milestones keep going. A contract dispute
//! only flags the contract.
//!
//! Resolution is reserved to platform arbitrators and must fit the target:
//!
//! | target    | outcomes                                        |
//! |-----------|-------------------------------------------------|
//! | milestone | `approve_milestone`, `reject_milestone`, `resume_milestone` |
//! | contract  | `dismiss`, `refund`                             |
//!
//! Milestone disputes run under the milestone lock, contract disputes under
//! the contract lock.

use guild_core::{Actor, ContractId, DisputeId, MilestoneId};
use guild_escrow::{Dispute, DisputeOutcome, DisputeTarget, EscrowError};
use guild_state::MilestoneTrigger;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::escrow::{stage_refund, stage_release};
use crate::events::EngineEvent;
use crate::locks::KeyGuard;
use crate::milestones::{apply_trigger, require_active, require_party};
use crate::store::Tables;

fn dispute_error(
    err: EscrowError,
    dispute_id: DisputeId,
    operation: &'static str,
    required: &'static str,
) -> EngineError {
    match err {
        EscrowError::Transition(t) => {
            EngineError::invalid_state("dispute", dispute_id, operation, required, &t)
        }
        other => other.into(),
    }
}

fn require_arbitrator(actor: &Actor, operation: &'static str) -> Result<(), EngineError> {
    if actor.is_arbitrator() {
        Ok(())
    } else {
        Err(EngineError::Forbidden {
            operation,
            required: "arbitrator role",
        })
    }
}

/// Whether another contract-level dispute besides `except` is still open.
fn other_contract_dispute_open(t: &Tables, contract_id: &ContractId, except: DisputeId) -> bool {
    t.disputes_of(contract_id)
        .iter()
        .any(|d| d.id != except && d.target == DisputeTarget::Contract && d.is_open())
}

type TargetGuard<'a> = (
    Option<KeyGuard<'a, ContractId>>,
    Option<KeyGuard<'a, MilestoneId>>,
);

impl Engine {
    fn lock_dispute_target(
        &self,
        contract_id: ContractId,
        target: DisputeTarget,
    ) -> Result<TargetGuard<'_>, EngineError> {
        Ok(match target {
            DisputeTarget::Contract => (Some(self.lock_contract(contract_id)?), None),
            DisputeTarget::Milestone(id) => (None, Some(self.lock_milestone(id)?)),
        })
    }

    /// Raise a dispute on a contract, or on one of its milestones.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `actor` is the client or on the team.
    /// - `InvalidState` unless the contract is active.
    /// - `Validation` for a blank reason.
    /// - `NotFound` if the milestone is not part of the contract.
    /// - `InvalidTransition` if the milestone is approved or already
    ///   disputed.
    pub fn file_dispute(
        &self,
        contract_id: ContractId,
        milestone_id: Option<MilestoneId>,
        reason: &str,
        evidence: Vec<String>,
        actor: &Actor,
    ) -> Result<Dispute, EngineError> {
        let target = milestone_id.map_or(DisputeTarget::Contract, DisputeTarget::Milestone);
        let _guard = self.lock_dispute_target(contract_id, target)?;

        let dispute = self.commit(|t| {
            let mut contract = t.contract(&contract_id)?.clone();
            require_party(&contract, actor, "file_dispute")?;
            require_active(&contract, "file_dispute")?;
            let dispute = Dispute::file(contract_id, target, actor.user_id, reason, evidence)?;

            match target {
                DisputeTarget::Milestone(mid) => {
                    let mut milestone = t
                        .milestone(&mid)
                        .ok()
                        .filter(|m| m.contract_id == contract_id)
                        .ok_or_else(|| EngineError::not_found("milestone", mid))?
                        .clone();
                    apply_trigger(&mut milestone, MilestoneTrigger::RaiseDispute, &dispute.reason)?;
                    t.put_milestone(milestone);
                }
                DisputeTarget::Contract => {
                    contract.flagged = true;
                    t.put_contract(contract);
                }
            }
            t.put_dispute(dispute.clone());
            let filed = EngineEvent::DisputeFiled {
                dispute_id: dispute.id,
                contract_id,
                milestone_id,
            };
            Ok::<_, EngineError>((dispute, vec![filed]))
        })?;

        tracing::info!(
            dispute_id = %dispute.id,
            contract_id = %contract_id,
            milestone_id = ?milestone_id,
            raised_by = %actor.user_id,
            "dispute filed"
        );
        Ok(dispute)
    }

    /// An arbitrator picks up an open dispute.
    pub fn begin_dispute_review(
        &self,
        dispute_id: DisputeId,
        actor: &Actor,
    ) -> Result<Dispute, EngineError> {
        require_arbitrator(actor, "begin_dispute_review")?;
        let filed = self.get_dispute(&dispute_id)?;
        let _guard = self.lock_dispute_target(filed.contract_id, filed.target)?;

        let dispute = self.commit(|t| {
            let mut dispute = t.dispute(&dispute_id)?.clone();
            dispute
                .begin_review(actor.user_id)
                .map_err(|e| dispute_error(e, dispute_id, "begin_dispute_review", "open"))?;
            t.put_dispute(dispute.clone());
            let event = EngineEvent::DisputeUnderReview {
                dispute_id,
                contract_id: dispute.contract_id,
            };
            Ok::<_, EngineError>((dispute, vec![event]))
        })?;

        tracing::info!(dispute_id = %dispute_id, arbitrator = %actor.user_id, "dispute under review");
        Ok(dispute)
    }

    /// Decide a dispute and apply its outcome.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `actor` is an arbitrator.
    /// - `Validation` if the outcome does not fit the dispute's target.
    /// - `InvalidState` if the dispute is already resolved.
    /// - Escrow errors from the release or refund the outcome triggers;
    ///   the dispute then stays open.
    pub fn resolve_dispute(
        &self,
        dispute_id: DisputeId,
        outcome: DisputeOutcome,
        note: Option<String>,
        actor: &Actor,
    ) -> Result<Dispute, EngineError> {
        require_arbitrator(actor, "resolve_dispute")?;
        let filed = self.get_dispute(&dispute_id)?;
        let _guard = self.lock_dispute_target(filed.contract_id, filed.target)?;

        let dispute = self.commit(|t| {
            let mut dispute = t.dispute(&dispute_id)?.clone();
            dispute
                .check_resolution(outcome)
                .map_err(|e| dispute_error(e, dispute_id, "resolve_dispute", "open or under_review"))?;
            let mut contract = t.contract(&dispute.contract_id)?.clone();
            let mut project = t.project(&contract.project_id)?.clone();
            let mut events = Vec::new();

            let mut milestone = match dispute.target {
                DisputeTarget::Milestone(mid) => Some(t.milestone(&mid)?.clone()),
                DisputeTarget::Contract => None,
            };
            let mut money_moved = false;
            match (outcome, milestone.as_mut()) {
                (DisputeOutcome::ApproveMilestone, Some(m)) => {
                    stage_release(&mut contract, &mut project, m, &mut events)?;
                    apply_trigger(
                        m,
                        MilestoneTrigger::Resolve(guild_state::MilestoneResolution::Approved),
                        "approved in arbitration",
                    )?;
                    money_moved = true;
                }
                (DisputeOutcome::RejectMilestone | DisputeOutcome::ResumeMilestone, Some(m)) => {
                    if let Some(resolution) = outcome.milestone_resolution() {
                        apply_trigger(m, MilestoneTrigger::Resolve(resolution), "resolved in arbitration")?;
                    }
                }
                (DisputeOutcome::Refund, None) => {
                    let reason = format!("refund ordered in dispute {dispute_id}");
                    stage_refund(&mut contract, &mut project, &reason, &mut events)?;
                    contract.flagged = false;
                    money_moved = true;
                }
                (DisputeOutcome::Dismiss, None) => {
                    contract.flagged = other_contract_dispute_open(t, &contract.id, dispute_id);
                }
                _ => {}
            }

            dispute
                .resolve(outcome, note, actor.user_id)
                .map_err(|e| dispute_error(e, dispute_id, "resolve_dispute", "open or under_review"))?;
            events.insert(
                0,
                EngineEvent::DisputeResolved {
                    dispute_id,
                    contract_id: contract.id,
                    outcome,
                },
            );

            if let Some(m) = milestone {
                t.put_milestone(m);
            }
            if money_moved {
                t.put_project(project);
            }
            t.put_contract(contract);
            t.put_dispute(dispute.clone());
            Ok::<_, EngineError>((dispute, events))
        })?;

        tracing::info!(
            dispute_id = %dispute_id,
            outcome = outcome.as_str(),
            arbitrator = %actor.user_id,
            "dispute resolved"
        );
        Ok(dispute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MilestoneDraft;
    use guild_core::{BudgetRange, TeamId, UserId};
    use guild_state::{ContractStatus, DisputeStatus, EscrowStatus, MilestoneStatus, ProjectStatus};

    struct Case {
        engine: Engine,
        client: Actor,
        member: Actor,
        arbitrator: Actor,
        contract: ContractId,
        m1: MilestoneId,
        m2: MilestoneId,
    }

    fn case() -> Case {
        let engine = Engine::in_memory();
        let client = Actor::user(UserId::new());
        let team = TeamId::new();
        let member = Actor::user(UserId::new()).with_team(team);
        let project = engine
            .register_project("Dispute", BudgetRange::new(1, 3_000).unwrap(), &client)
            .unwrap()
            .id;
        let proposal = engine.submit_proposal(project, team, 3_000, 2, &member).unwrap();
        let contract = engine
            .accept_proposal_with_plan(
                project,
                proposal.id,
                &[MilestoneDraft::new("M1", 1_000), MilestoneDraft::new("M2", 2_000)],
                &client,
            )
            .unwrap()
            .id;
        engine.fund_escrow(contract, 3_000, &client).unwrap();
        let ms = engine.list_milestones(&contract).unwrap();
        for m in &ms {
            engine.start_milestone(m.id, &member).unwrap();
        }
        engine.submit_milestone(ms[0].id, "v1", vec![], &member).unwrap();
        Case {
            engine,
            client,
            member,
            arbitrator: Actor::arbitrator(UserId::new()),
            contract,
            m1: ms[0].id,
            m2: ms[1].id,
        }
    }

    #[test]
    fn milestone_dispute_freezes_only_that_milestone() {
        let c = case();
        let d = c
            .engine
            .file_dispute(c.contract, Some(c.m1), "scope disagreement", vec![], &c.member)
            .unwrap();
        assert_eq!(d.status(), DisputeStatus::Open);
        assert_eq!(
            c.engine.get_milestone(&c.m1).unwrap().status(),
            MilestoneStatus::Dispute
        );
        assert_eq!(
            c.engine.review_milestone(c.m1, true, "", &c.client).unwrap_err().code(),
            "INVALID_STATE"
        );
        // The other milestone continues.
        c.engine.submit_milestone(c.m2, "v1", vec![], &c.member).unwrap();
    }

    #[test]
    fn approve_in_arbitration_releases_escrow() {
        let c = case();
        let d = c
            .engine
            .file_dispute(c.contract, Some(c.m1), "client unresponsive", vec![], &c.member)
            .unwrap();
        c.engine.begin_dispute_review(d.id, &c.arbitrator).unwrap();
        let resolved = c
            .engine
            .resolve_dispute(d.id, DisputeOutcome::ApproveMilestone, Some("work meets brief".into()), &c.arbitrator)
            .unwrap();
        assert_eq!(resolved.status(), DisputeStatus::Resolved);
        assert_eq!(
            c.engine.get_milestone(&c.m1).unwrap().status(),
            MilestoneStatus::Approved
        );
        assert_eq!(
            c.engine.get_escrow_summary(&c.contract).unwrap().released.minor_units(),
            1_000
        );
    }

    #[test]
    fn resume_and_reject_outcomes() {
        let c = case();
        let d = c
            .engine
            .file_dispute(c.contract, Some(c.m2), "blocked", vec![], &c.client)
            .unwrap();
        c.engine
            .resolve_dispute(d.id, DisputeOutcome::ResumeMilestone, None, &c.arbitrator)
            .unwrap();
        assert_eq!(
            c.engine.get_milestone(&c.m2).unwrap().status(),
            MilestoneStatus::InProgress
        );

        let d = c
            .engine
            .file_dispute(c.contract, Some(c.m1), "bad quality", vec![], &c.client)
            .unwrap();
        c.engine
            .resolve_dispute(d.id, DisputeOutcome::RejectMilestone, None, &c.arbitrator)
            .unwrap();
        assert_eq!(
            c.engine.get_milestone(&c.m1).unwrap().status(),
            MilestoneStatus::Rejected
        );
    }

    #[test]
    fn mismatched_outcome_is_validation_error() {
        let c = case();
        let d = c
            .engine
            .file_dispute(c.contract, Some(c.m1), "x", vec![], &c.client)
            .unwrap();
        let err = c
            .engine
            .resolve_dispute(d.id, DisputeOutcome::Dismiss, None, &c.arbitrator)
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(c.engine.get_dispute(&d.id).unwrap().is_open());
    }

    #[test]
    fn only_arbitrators_resolve() {
        let c = case();
        let d = c
            .engine
            .file_dispute(c.contract, None, "payment terms", vec![], &c.member)
            .unwrap();
        let err = c
            .engine
            .resolve_dispute(d.id, DisputeOutcome::Dismiss, None, &c.client)
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn contract_dispute_flags_and_dismiss_clears() {
        let c = case();
        let d = c
            .engine
            .file_dispute(c.contract, None, "payment terms", vec!["chat.log".into()], &c.member)
            .unwrap();
        assert!(c.engine.get_contract(&c.contract).unwrap().flagged);
        c.engine
            .resolve_dispute(d.id, DisputeOutcome::Dismiss, None, &c.arbitrator)
            .unwrap();
        assert!(!c.engine.get_contract(&c.contract).unwrap().flagged);
        let err = c
            .engine
            .resolve_dispute(d.id, DisputeOutcome::Dismiss, None, &c.arbitrator)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[test]
    fn refund_outcome_terminates_contract() {
        let c = case();
        let d = c
            .engine
            .file_dispute(c.contract, None, "team abandoned work", vec![], &c.client)
            .unwrap();
        c.engine
            .resolve_dispute(d.id, DisputeOutcome::Refund, None, &c.arbitrator)
            .unwrap();
        let contract = c.engine.get_contract(&c.contract).unwrap();
        assert_eq!(contract.escrow_status(), EscrowStatus::Refunded);
        assert_eq!(contract.status(), ContractStatus::Terminated);
        assert!(!contract.flagged);
        assert_eq!(
            c.engine.get_project(&contract.project_id).unwrap().status(),
            ProjectStatus::Cancelled
        );
    }

    #[test]
    fn disputes_need_a_party_and_a_reason() {
        let c = case();
        assert_eq!(
            c.engine
                .file_dispute(c.contract, None, "x", vec![], &Actor::user(UserId::new()))
                .unwrap_err()
                .code(),
            "FORBIDDEN"
        );
        assert_eq!(
            c.engine
                .file_dispute(c.contract, None, "  ", vec![], &c.client)
                .unwrap_err()
                .code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            c.engine
                .file_dispute(c.contract, Some(MilestoneId::new()), "x", vec![], &c.client)
                .unwrap_err()
                .code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn disputing_twice_is_invalid_transition() {
        let c = case();
        c.engine
            .file_dispute(c.contract, Some(c.m1), "x", vec![], &c.client)
            .unwrap();
        let err = c
            .engine
            .file_dispute(c.contract, Some(c.m1), "again", vec![], &c.client)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(c.engine.list_disputes(&c.contract).unwrap().len(), 1);
    }

    #[test]
    fn open_disputes_are_listed_for_escalation() {
        let c = case();
        let d = c
            .engine
            .file_dispute(c.contract, Some(c.m1), "x", vec![], &c.client)
            .unwrap();
        let open = c.engine.list_open_disputes(chrono::Duration::zero());
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, d.id);
        assert!(c.engine.list_open_disputes(chrono::Duration::hours(1)).is_empty());
    }
}
