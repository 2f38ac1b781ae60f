//! # Route Modules
//!
//! One module per engine component. Every mutating handler runs the engine
//! command on the blocking pool (a command may wait on an entity lock),
//! then writes the touched project through to the database.

pub mod contracts;
pub mod disputes;
pub mod events;
pub mod milestones;
pub mod projects;
pub mod proposals;
pub mod teams;
pub mod views;

use guild_core::{Actor, ContractId, MilestoneId};
use guild_engine::EngineError;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

/// Resolve the caller into an engine actor.
pub(crate) fn actor(state: &AppState, caller: &CallerIdentity) -> Actor {
    caller.actor(state.directory.as_ref())
}

/// Persist the project owning `contract_id`.
pub(crate) async fn persist_contract(
    state: &AppState,
    contract_id: &ContractId,
) -> Result<(), AppError> {
    let contract = state.engine.get_contract(contract_id)?;
    state.persist_project(&contract.project_id).await
}

/// Persist the project owning `milestone_id`.
pub(crate) async fn persist_milestone(
    state: &AppState,
    milestone_id: &MilestoneId,
) -> Result<(), AppError> {
    let milestone = state.engine.get_milestone(milestone_id)?;
    persist_contract(state, &milestone.contract_id).await
}

/// Run an engine command off the async executor.
pub(crate) async fn blocking<T, F>(command: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(command)
        .await
        .map_err(|e| AppError::Internal(format!("engine task failed: {e}")))?
        .map_err(AppError::from)
}
