//! # Project Intake
//!
//! Registers client projects so proposals have something to bid on. Project
//! editing and cancellation before acceptance stay with the host's CRUD
//! layer.

use guild_core::{Actor, BudgetRange, ProjectId, Timestamp, ValidationError};
use guild_state::{ProjectStatus, StateTrail};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::records::Project;

impl Engine {
    /// Post a new project owned by `actor`, in `open` status.
    pub fn register_project(
        &self,
        title: &str,
        budget: BudgetRange,
        actor: &Actor,
    ) -> Result<Project, EngineError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyField("title").into());
        }
        let project = Project {
            id: ProjectId::new(),
            client_id: actor.user_id,
            title: title.to_string(),
            budget,
            trail: StateTrail::new(ProjectStatus::Open),
            created_at: Timestamp::now(),
        };
        self.store.transact(|t| {
            t.put_project(project.clone());
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(project_id = %project.id, client_id = %actor.user_id, "project registered");
        Ok(project)
    }
}
