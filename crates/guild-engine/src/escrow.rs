//! # Escrow Commands
//!
//! Funding, holds and refunds on a contract's escrow account, plus the
//! staged milestone release shared by review approval and dispute
//! resolution. The account's own state machine lives in `guild-escrow`;
//! this module wires its outcomes into the contract and project lifecycles:
//!
//! - funding activates the contract and puts the project in progress;
//! - releasing the last of the total completes contract and project;
//! - a refund terminates the contract and cancels the project.
//!
//! Commands run under the per-contract lock. The release helper runs under
//! whichever milestone lock its caller holds; it touches the account only
//! inside the store's write section.

use guild_core::{Actor, Amount, ContractId, ValidationError};
use guild_escrow::{EscrowSummary, ReleaseOutcome};
use guild_state::{ContractStatus, Lifecycle, ProjectStatus};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::records::{Contract, Milestone, Project};

/// Move `contract` to `to`, queueing the change event.
pub(crate) fn advance_contract(
    contract: &mut Contract,
    to: ContractStatus,
    reason: &str,
    operation: &'static str,
    events: &mut Vec<EngineEvent>,
) -> Result<(), EngineError> {
    let from = contract.status();
    contract.trail.advance(to, reason).map_err(|e| {
        EngineError::invalid_state("contract", contract.id, operation, required_for(to), &e)
    })?;
    events.push(EngineEvent::ContractStatusChanged {
        contract_id: contract.id,
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    });
    Ok(())
}

fn required_for(to: ContractStatus) -> &'static str {
    match to {
        ContractStatus::Active => "draft",
        ContractStatus::Completed => "active",
        ContractStatus::Terminated => "draft or active",
        ContractStatus::Draft => "none",
    }
}

/// Move `project` to `to` unless it is already there.
pub(crate) fn advance_project(
    project: &mut Project,
    to: ProjectStatus,
    reason: &str,
    operation: &'static str,
    events: &mut Vec<EngineEvent>,
) -> Result<(), EngineError> {
    let from = project.status();
    if from == to {
        return Ok(());
    }
    project.trail.advance(to, reason).map_err(|e| {
        EngineError::invalid_state("project", project.id, operation, to.as_str(), &e)
    })?;
    events.push(EngineEvent::ProjectStatusChanged {
        project_id: project.id,
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    });
    Ok(())
}

/// Release `milestone.amount` from staged copies of its contract and
/// project. Completes both when the escrow is fully paid out.
///
/// Returns `false` if the milestone had already been paid.
pub(crate) fn stage_release(
    contract: &mut Contract,
    project: &mut Project,
    milestone: &Milestone,
    events: &mut Vec<EngineEvent>,
) -> Result<bool, EngineError> {
    match contract
        .escrow
        .release_for_milestone(milestone.id, milestone.amount)?
    {
        ReleaseOutcome::AlreadyReleased => Ok(false),
        ReleaseOutcome::Partial => {
            events.push(EngineEvent::EscrowMilestoneReleased {
                contract_id: contract.id,
                milestone_id: milestone.id,
                amount: milestone.amount,
            });
            Ok(true)
        }
        ReleaseOutcome::FullyReleased => {
            events.push(EngineEvent::EscrowMilestoneReleased {
                contract_id: contract.id,
                milestone_id: milestone.id,
                amount: milestone.amount,
            });
            events.push(EngineEvent::EscrowReleased {
                contract_id: contract.id,
                total_amount: contract.total_amount,
            });
            advance_contract(
                contract,
                ContractStatus::Completed,
                "escrow fully released",
                "release",
                events,
            )?;
            advance_project(
                project,
                ProjectStatus::Completed,
                "contract completed",
                "release",
                events,
            )?;
            Ok(true)
        }
    }
}

/// Refund staged copies and terminate the engagement.
pub(crate) fn stage_refund(
    contract: &mut Contract,
    project: &mut Project,
    reason: &str,
    events: &mut Vec<EngineEvent>,
) -> Result<Amount, EngineError> {
    let refunded = contract.escrow.refund(reason)?;
    events.push(EngineEvent::EscrowRefunded {
        contract_id: contract.id,
        amount: refunded,
    });
    advance_contract(contract, ContractStatus::Terminated, reason, "refund", events)?;
    advance_project(project, ProjectStatus::Cancelled, reason, "refund", events)?;
    Ok(refunded)
}

fn require_client_or_arbitrator(
    contract: &Contract,
    actor: &Actor,
    operation: &'static str,
) -> Result<(), EngineError> {
    if actor.is_client_of(&contract.client_id) || actor.is_arbitrator() {
        Ok(())
    } else {
        Err(EngineError::Forbidden {
            operation,
            required: "contract's client or an arbitrator",
        })
    }
}

impl Engine {
    /// Deposit the contract total. Activates the contract.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `actor` is the contract's client.
    /// - `InvalidTransition` unless the escrow is not funded yet.
    /// - `AmountMismatch` if `amount` differs from the contract total.
    pub fn fund_escrow(
        &self,
        contract_id: ContractId,
        amount: i64,
        actor: &Actor,
    ) -> Result<EscrowSummary, EngineError> {
        let _guard = self.lock_contract(contract_id)?;
        let summary = self.commit(|t| {
            let mut contract = t.contract(&contract_id)?.clone();
            if !actor.is_client_of(&contract.client_id) {
                return Err(EngineError::Forbidden {
                    operation: "fund_escrow",
                    required: "contract's client",
                });
            }
            let mut project = t.project(&contract.project_id)?.clone();
            let deposit = Amount::new(amount)?;
            let mut events = Vec::new();

            contract.escrow.deposit(deposit)?;
            events.push(EngineEvent::EscrowFunded {
                contract_id,
                amount: deposit,
            });
            advance_contract(
                &mut contract,
                ContractStatus::Active,
                "escrow funded",
                "fund_escrow",
                &mut events,
            )?;
            advance_project(
                &mut project,
                ProjectStatus::InProgress,
                "escrow funded",
                "fund_escrow",
                &mut events,
            )?;

            let summary = contract.escrow.summary();
            t.put_contract(contract);
            t.put_project(project);
            Ok((summary, events))
        })?;

        tracing::info!(contract_id = %contract_id, amount, "escrow funded");
        Ok(summary)
    }

    /// Freeze milestone releases on a funded escrow.
    pub fn hold_escrow(
        &self,
        contract_id: ContractId,
        reason: &str,
        actor: &Actor,
    ) -> Result<EscrowSummary, EngineError> {
        let reason = non_blank(reason)?;
        let _guard = self.lock_contract(contract_id)?;
        let summary = self.commit(|t| {
            let mut contract = t.contract(&contract_id)?.clone();
            require_client_or_arbitrator(&contract, actor, "hold_escrow")?;
            contract.escrow.hold(reason)?;
            let summary = contract.escrow.summary();
            t.put_contract(contract);
            Ok::<_, EngineError>((summary, vec![EngineEvent::EscrowHeld { contract_id }]))
        })?;

        tracing::info!(contract_id = %contract_id, actor = %actor, reason, "escrow put on hold");
        Ok(summary)
    }

    /// Lift a hold.
    pub fn release_hold(
        &self,
        contract_id: ContractId,
        reason: &str,
        actor: &Actor,
    ) -> Result<EscrowSummary, EngineError> {
        let reason = non_blank(reason)?;
        let _guard = self.lock_contract(contract_id)?;
        let summary = self.commit(|t| {
            let mut contract = t.contract(&contract_id)?.clone();
            require_client_or_arbitrator(&contract, actor, "release_hold")?;
            contract.escrow.release_hold(reason)?;
            let summary = contract.escrow.summary();
            t.put_contract(contract);
            let event = EngineEvent::EscrowHoldReleased { contract_id };
            Ok::<_, EngineError>((summary, vec![event]))
        })?;

        tracing::info!(contract_id = %contract_id, actor = %actor, "escrow hold released");
        Ok(summary)
    }

    /// Return the held balance to the client and terminate the contract.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless `actor` is an arbitrator; `InvalidTransition`
    /// unless the escrow is funded or on hold.
    pub fn refund_escrow(
        &self,
        contract_id: ContractId,
        reason: &str,
        actor: &Actor,
    ) -> Result<EscrowSummary, EngineError> {
        if !actor.is_arbitrator() {
            return Err(EngineError::Forbidden {
                operation: "refund_escrow",
                required: "arbitrator role",
            });
        }
        let reason = non_blank(reason)?;
        let _guard = self.lock_contract(contract_id)?;
        let (summary, refunded) = self.commit(|t| {
            let mut contract = t.contract(&contract_id)?.clone();
            let mut project = t.project(&contract.project_id)?.clone();
            let mut events = Vec::new();
            let refunded = stage_refund(&mut contract, &mut project, reason, &mut events)?;
            let summary = contract.escrow.summary();
            t.put_contract(contract);
            t.put_project(project);
            Ok::<_, EngineError>(((summary, refunded), events))
        })?;

        tracing::info!(
            contract_id = %contract_id,
            refunded = refunded.minor_units(),
            reason,
            "escrow refunded"
        );
        Ok(summary)
    }
}

fn non_blank(value: &str) -> Result<&str, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("reason").into());
    }
    Ok(trimmed)
}
