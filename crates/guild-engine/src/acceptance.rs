//! # AcceptanceOrchestrator
//!
//! Accepting a proposal is one atomic unit under the per-project lock:
//!
//! 1. the proposal moves to `accepted`;
//! 2. every other pending proposal of the project moves to `rejected`;
//! 3. the project moves to `negotiating`;
//! 4. [`ContractFactory`] materializes the contract, seeded with the
//!    negotiated milestone plan.
//!
//! Every step is staged on cloned records and validated before the first
//! write. A factory failure (contract ceiling, over-allocated plan) leaves
//! proposals, project and contracts exactly as they were.
//!
//! Acceptance is idempotent on `(project_id, proposal_id)`: repeating it
//! returns the contract created the first time.

use guild_core::{
    Actor, Amount, ContractId, FeeRate, MilestoneId, ProjectId, ProposalId, Timestamp, UserId,
    ValidationError,
};
use guild_escrow::EscrowAccount;
use guild_state::{ContractStatus, Lifecycle, MilestoneStatus, ProjectStatus, ProposalStatus, StateTrail};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::records::{Contract, Milestone, MilestoneDraft, Proposal};

/// Builds contracts and their seeded milestones from accepted proposals.
#[derive(Debug, Clone, Copy)]
pub struct ContractFactory {
    fee_rate: FeeRate,
    ceiling: Option<Amount>,
}

impl ContractFactory {
    /// Factory applying `fee_rate` and rejecting totals above `ceiling`.
    pub fn new(fee_rate: FeeRate, ceiling: Option<Amount>) -> Self {
        Self { fee_rate, ceiling }
    }

    /// Create a draft contract with an unfunded escrow for `proposal`.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` if the total exceeds the ceiling or the plan
    /// allocates more than the total; `Validation` for a blank milestone
    /// name.
    pub fn create(
        &self,
        proposal: &Proposal,
        client_id: UserId,
        plan: &[MilestoneDraft],
    ) -> Result<(Contract, Vec<Milestone>), EngineError> {
        let total = proposal.proposed_budget;
        if let Some(ceiling) = self.ceiling {
            if total > ceiling {
                return Err(EngineError::InvalidAmount(format!(
                    "contract total {total} exceeds the ceiling of {ceiling}"
                )));
            }
        }

        let contract_id = ContractId::new();
        let now = Timestamp::now();
        let mut milestones = Vec::with_capacity(plan.len());
        let mut allocated = Amount::ZERO;
        for (index, draft) in plan.iter().enumerate() {
            let milestone = draft_to_milestone(contract_id, draft, index, now)?;
            allocated = allocated
                .checked_add(milestone.amount)
                .filter(|sum| *sum <= total)
                .ok_or_else(|| over_allocation(total, allocated, milestone.amount))?;
            milestones.push(milestone);
        }

        let contract = Contract {
            id: contract_id,
            project_id: proposal.project_id,
            proposal_id: proposal.id,
            team_id: proposal.team_id,
            client_id,
            total_amount: total,
            fee_rate: self.fee_rate,
            trail: StateTrail::new(ContractStatus::Draft),
            escrow: EscrowAccount::open(contract_id, total, self.fee_rate),
            flagged: false,
            created_at: now,
        };
        Ok((contract, milestones))
    }
}

fn draft_to_milestone(
    contract_id: ContractId,
    draft: &MilestoneDraft,
    index: usize,
    created_at: Timestamp,
) -> Result<Milestone, EngineError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyField("milestone name").into());
    }
    let order_index = u32::try_from(index)
        .map_err(|_| EngineError::Validation("too many milestones".to_string()))?;
    Ok(Milestone {
        id: MilestoneId::new(),
        contract_id,
        name: name.to_string(),
        amount: Amount::positive(draft.amount)?,
        due_date: draft.due_date,
        order_index,
        trail: StateTrail::new(MilestoneStatus::Pending),
        created_at,
    })
}

pub(crate) fn over_allocation(total: Amount, allocated: Amount, adding: Amount) -> EngineError {
    EngineError::InvalidAmount(format!(
        "milestones would total more than the contract amount {total} \
         ({allocated} allocated, adding {adding})"
    ))
}

impl Engine {
    /// Accept a proposal with no milestones planned yet.
    pub fn accept_proposal(
        &self,
        project_id: ProjectId,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<Contract, EngineError> {
        self.accept_proposal_with_plan(project_id, proposal_id, &[], actor)
    }

    /// Accept a proposal and seed the contract with `plan`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `actor` is the project's client.
    /// - `NotFound` if the project or proposal is missing, or the proposal
    ///   belongs to another project.
    /// - `InvalidState` if the proposal is not pending, the project is past
    ///   negotiation, or another proposal was already accepted.
    /// - `InvalidAmount` / `Validation` from the contract factory.
    /// - `Conflict` if the project lock could not be taken in time.
    pub fn accept_proposal_with_plan(
        &self,
        project_id: ProjectId,
        proposal_id: ProposalId,
        plan: &[MilestoneDraft],
        actor: &Actor,
    ) -> Result<Contract, EngineError> {
        let _guard = self.lock_project(project_id)?;
        let factory = ContractFactory::new(self.fee_rate, self.contract_ceiling);

        let outcome = self.commit(|t| {
            let project = t.project(&project_id)?;
            if !actor.is_client_of(&project.client_id) {
                return Err(EngineError::Forbidden {
                    operation: "accept_proposal",
                    required: "project's client",
                });
            }
            let proposal = t
                .proposal(&proposal_id)
                .ok()
                .filter(|p| p.project_id == project_id)
                .ok_or_else(|| EngineError::not_found("proposal", proposal_id))?;

            if let Some(existing) = t.acceptances.get(&proposal_id) {
                return t
                    .contract(existing)
                    .cloned()
                    .map(|c| (Accepted::Existing(c), Vec::new()));
            }
            if proposal.status() != ProposalStatus::Pending {
                return Err(EngineError::InvalidState {
                    entity: "proposal",
                    id: proposal_id.to_string(),
                    current: proposal.status().as_str().to_string(),
                    required: "pending".to_string(),
                    operation: "accept_proposal",
                });
            }
            if !project.status().accepts_acceptance() {
                return Err(EngineError::InvalidState {
                    entity: "project",
                    id: project_id.to_string(),
                    current: project.status().as_str().to_string(),
                    required: "open or negotiating".to_string(),
                    operation: "accept_proposal",
                });
            }
            let siblings = t.proposals_of(&project_id);
            if let Some(other) = siblings
                .iter()
                .find(|p| p.id != proposal_id && p.status() == ProposalStatus::Accepted)
            {
                return Err(EngineError::InvalidState {
                    entity: "project",
                    id: project_id.to_string(),
                    current: format!("proposal {} accepted", other.id),
                    required: "no accepted proposal".to_string(),
                    operation: "accept_proposal",
                });
            }

            // Stage.
            let mut accepted = proposal.clone();
            accepted
                .trail
                .advance(ProposalStatus::Accepted, "accepted by client")
                .map_err(|e| {
                    EngineError::invalid_state("proposal", proposal_id, "accept_proposal", "pending", &e)
                })?;

            let mut rejected = Vec::new();
            for sibling in siblings
                .into_iter()
                .filter(|p| p.id != proposal_id && p.status() == ProposalStatus::Pending)
            {
                let mut sibling = sibling.clone();
                sibling
                    .trail
                    .advance(ProposalStatus::Rejected, "another proposal accepted")
                    .map_err(|e| {
                        EngineError::invalid_state("proposal", sibling.id, "reject", "pending", &e)
                    })?;
                rejected.push(sibling);
            }

            let mut project = project.clone();
            let project_change = if project.status() == ProjectStatus::Negotiating {
                None
            } else {
                let from = project.status();
                project
                    .trail
                    .advance(ProjectStatus::Negotiating, "proposal accepted")
                    .map_err(|e| {
                        EngineError::invalid_state(
                            "project",
                            project_id,
                            "accept_proposal",
                            "open or negotiating",
                            &e,
                        )
                    })?;
                Some(from)
            };

            let (contract, milestones) = factory.create(&accepted, project.client_id, plan)?;

            // Commit.
            let mut events = vec![EngineEvent::ProposalAccepted {
                project_id,
                proposal_id,
                team_id: accepted.team_id,
                contract_id: contract.id,
            }];
            events.extend(rejected.iter().map(|p| EngineEvent::ProposalRejected {
                project_id,
                proposal_id: p.id,
                team_id: p.team_id,
            }));
            if let Some(from) = project_change {
                events.push(EngineEvent::ProjectStatusChanged {
                    project_id,
                    from: from.as_str().to_string(),
                    to: project.status().as_str().to_string(),
                });
            }
            events.push(EngineEvent::ContractCreated {
                contract_id: contract.id,
                project_id,
                team_id: contract.team_id,
                total_amount: contract.total_amount,
            });
            events.extend(milestones.iter().map(|m| EngineEvent::MilestoneAdded {
                contract_id: contract.id,
                milestone_id: m.id,
                amount: m.amount,
            }));

            let rejected_count = rejected.len();
            t.put_proposal(accepted);
            for sibling in rejected {
                t.put_proposal(sibling);
            }
            t.put_project(project);
            t.put_contract(contract.clone());
            for milestone in milestones {
                t.put_milestone(milestone);
            }
            Ok((
                Accepted::Created {
                    contract,
                    rejected_count,
                },
                events,
            ))
        })?;

        match outcome {
            Accepted::Existing(contract) => {
                tracing::debug!(
                    project_id = %project_id,
                    proposal_id = %proposal_id,
                    contract_id = %contract.id,
                    "proposal already accepted, returning existing contract"
                );
                Ok(contract)
            }
            Accepted::Created {
                contract,
                rejected_count,
            } => {
                tracing::info!(
                    project_id = %project_id,
                    proposal_id = %proposal_id,
                    contract_id = %contract.id,
                    rejected = rejected_count,
                    "proposal accepted"
                );
                Ok(contract)
            }
        }
    }
}

enum Accepted {
    Existing(Contract),
    Created {
        contract: Contract,
        rejected_count: usize,
    },
}
