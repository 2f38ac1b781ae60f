//! # Projects API
//!
//! Clients post projects; everyone can browse them.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use guild_core::{BudgetRange, ProjectId};

use super::views::{ContractView, ProjectView};
use super::{actor, blocking};
use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{check_len, extract_validated_json, Validate};
use crate::state::AppState;

/// Register-project request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub title: String,
    /// Lower budget bound, minor units.
    pub budget_min: i64,
    /// Upper budget bound, minor units.
    pub budget_max: i64,
}

impl Validate for CreateProjectRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("title", &self.title, 200)
    }
}

/// Build the projects router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/projects", get(list_projects).post(create_project))
        .route("/v1/projects/:project_id", get(get_project))
        .route("/v1/projects/:project_id/contracts", get(list_project_contracts))
}

/// POST /v1/projects — Register a project as its client.
#[utoipa::path(
    post,
    path = "/v1/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project registered", body = ProjectView),
        (status = 422, description = "Invalid title or budget", body = ErrorBody),
    ),
    tag = "projects"
)]
async fn create_project(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProjectView>), AppError> {
    let req = extract_validated_json(body)?;
    let budget = BudgetRange::new(req.budget_min, req.budget_max)?;
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let project =
        blocking(move || engine.register_project(&req.title, budget, &actor)).await?;
    state.persist_project(&project.id).await?;
    Ok((StatusCode::CREATED, Json(project.into())))
}

/// GET /v1/projects — List projects, oldest first.
#[utoipa::path(
    get,
    path = "/v1/projects",
    responses((status = 200, description = "All projects", body = Vec<ProjectView>)),
    tag = "projects"
)]
async fn list_projects(State(state): State<AppState>) -> Json<Vec<ProjectView>> {
    Json(
        state
            .engine
            .list_projects()
            .into_iter()
            .map(Into::into)
            .collect(),
    )
}

/// GET /v1/projects/{project_id} — Look up a project.
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = ProjectView),
        (status = 404, description = "Unknown project", body = ErrorBody),
    ),
    tag = "projects"
)]
async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectView>, AppError> {
    let project = state.engine.get_project(&ProjectId::from_uuid(project_id))?;
    Ok(Json(project.into()))
}

/// GET /v1/projects/{project_id}/contracts — Contracts of a project.
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/contracts",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Contracts", body = Vec<ContractView>),
        (status = 404, description = "Unknown project", body = ErrorBody),
    ),
    tag = "projects"
)]
async fn list_project_contracts(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<ContractView>>, AppError> {
    let project_id = ProjectId::from_uuid(project_id);
    state.engine.get_project(&project_id)?;
    Ok(Json(
        state
            .engine
            .contracts_of_project(&project_id)
            .into_iter()
            .map(Into::into)
            .collect(),
    ))
}
