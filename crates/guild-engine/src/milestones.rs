//! # MilestoneLedger
//!
//! Milestones partition a contract's total into separately payable units.
//! The ledger never allows the allocated sum to exceed the contract total;
//! it may stay below it while the contract runs, in which case the escrow
//! cannot complete until further milestones are added.

use chrono::NaiveDate;

use guild_core::{Actor, Amount, ContractId, MilestoneId, Timestamp, ValidationError};
use guild_state::{Lifecycle, MilestoneStatus, MilestoneTrigger, StateTrail};

use crate::acceptance::over_allocation;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::records::{Contract, Milestone};

pub(crate) fn require_party(
    contract: &Contract,
    actor: &Actor,
    operation: &'static str,
) -> Result<(), EngineError> {
    if actor.is_client_of(&contract.client_id) || actor.is_member_of(&contract.team_id) {
        Ok(())
    } else {
        Err(EngineError::Forbidden {
            operation,
            required: "contract's client or team",
        })
    }
}

pub(crate) fn require_active(contract: &Contract, operation: &'static str) -> Result<(), EngineError> {
    if contract.status() == guild_state::ContractStatus::Active {
        Ok(())
    } else {
        Err(EngineError::InvalidState {
            entity: "contract",
            id: contract.id.to_string(),
            current: contract.status().as_str().to_string(),
            required: "active".to_string(),
            operation,
        })
    }
}

/// Apply `trigger` to a staged milestone.
pub(crate) fn apply_trigger(
    milestone: &mut Milestone,
    trigger: MilestoneTrigger,
    reason: &str,
) -> Result<(), EngineError> {
    let next = milestone.status().apply(trigger)?;
    milestone.trail.advance(next, reason)?;
    Ok(())
}

impl Engine {
    /// Append a milestone to a draft or active contract.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `actor` is the client or a team member.
    /// - `InvalidState` unless the contract is draft or active.
    /// - `InvalidAmount` if `amount <= 0` or the allocation would exceed
    ///   the contract total.
    /// - `Validation` for a blank name.
    pub fn add_milestone(
        &self,
        contract_id: ContractId,
        name: &str,
        amount: i64,
        due_date: Option<NaiveDate>,
        actor: &Actor,
    ) -> Result<Milestone, EngineError> {
        let _guard = self.lock_contract(contract_id)?;
        let milestone = self.commit(|t| {
            let contract = t.contract(&contract_id)?;
            require_party(contract, actor, "add_milestone")?;
            if !contract.status().is_open_for_milestones() {
                return Err(EngineError::InvalidState {
                    entity: "contract",
                    id: contract_id.to_string(),
                    current: contract.status().as_str().to_string(),
                    required: "draft or active".to_string(),
                    operation: "add_milestone",
                });
            }
            let amount = Amount::positive(amount)?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::EmptyField("milestone name").into());
            }

            let existing = t.milestones_of(&contract_id);
            let allocated = Amount::try_sum(existing.iter().map(|m| m.amount))?;
            match allocated.checked_add(amount) {
                Some(sum) if sum <= contract.total_amount => {}
                _ => return Err(over_allocation(contract.total_amount, allocated, amount)),
            }
            let order_index = u32::try_from(existing.len())
                .map_err(|_| EngineError::Validation("too many milestones".to_string()))?;

            let milestone = Milestone {
                id: MilestoneId::new(),
                contract_id,
                name: name.to_string(),
                amount,
                due_date,
                order_index,
                trail: StateTrail::new(MilestoneStatus::Pending),
                created_at: Timestamp::now(),
            };
            t.put_milestone(milestone.clone());
            let added = EngineEvent::MilestoneAdded {
                contract_id,
                milestone_id: milestone.id,
                amount: milestone.amount,
            };
            Ok((milestone, vec![added]))
        })?;

        tracing::info!(
            contract_id = %contract_id,
            milestone_id = %milestone.id,
            amount = milestone.amount.minor_units(),
            "milestone added"
        );
        Ok(milestone)
    }

    /// Team begins work on a pending milestone.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless `actor` is on the contract's team; `InvalidState`
    /// unless the contract is active; `InvalidTransition` unless the
    /// milestone is pending.
    pub fn start_milestone(
        &self,
        milestone_id: MilestoneId,
        actor: &Actor,
    ) -> Result<Milestone, EngineError> {
        let _guard = self.lock_milestone(milestone_id)?;
        let milestone = self.commit(|t| {
            let mut milestone = t.milestone(&milestone_id)?.clone();
            let contract = t.contract(&milestone.contract_id)?;
            if !actor.is_member_of(&contract.team_id) {
                return Err(EngineError::Forbidden {
                    operation: "start_milestone",
                    required: "contract's team",
                });
            }
            require_active(contract, "start_milestone")?;
            apply_trigger(&mut milestone, MilestoneTrigger::Start, "work started")?;
            t.put_milestone(milestone.clone());
            let started = EngineEvent::MilestoneStarted {
                contract_id: milestone.contract_id,
                milestone_id,
            };
            Ok((milestone, vec![started]))
        })?;

        tracing::info!(milestone_id = %milestone_id, "milestone started");
        Ok(milestone)
    }
}
