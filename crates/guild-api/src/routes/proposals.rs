//! # Proposals API
//!
//! Teams bid on open projects; clients compare bids and accept one. The
//! accept endpoint is idempotent: repeating it for the already accepted
//! proposal returns the existing contract.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use guild_core::{ProjectId, ProposalId, TeamId};
use guild_engine::{MilestoneDraft, ProposalSort};

use super::views::{ContractView, ProposalView};
use super::{actor, blocking};
use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, extract_query};
use crate::state::AppState;

/// Submit-proposal request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitProposalRequest {
    pub team_id: Uuid,
    /// Proposed total price, minor units.
    pub proposed_budget: i64,
    pub proposed_timeline_weeks: u32,
}

/// One milestone of a negotiated plan.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlanItem {
    pub name: String,
    /// Payout, minor units.
    pub amount: i64,
    #[serde(default)]
    pub due_date: Option<chrono::NaiveDate>,
}

/// Accept-proposal request. The body is optional.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AcceptProposalRequest {
    /// Milestones to create with the contract.
    #[serde(default)]
    pub milestones: Vec<PlanItem>,
}

/// Ranking query.
#[derive(Debug, Deserialize, IntoParams)]
pub struct RankingQuery {
    /// `budget_asc` (default), `budget_desc`, `timeline_asc`, `rating_desc`
    /// or `level_desc`.
    pub sort: Option<String>,
}

/// Build the proposals router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/projects/:project_id/proposals",
            get(list_proposals).post(submit_proposal),
        )
        .route(
            "/v1/projects/:project_id/proposals/suggested",
            get(suggest_proposal),
        )
        .route(
            "/v1/projects/:project_id/proposals/:proposal_id/accept",
            post(accept_proposal),
        )
        .route("/v1/proposals/:proposal_id", get(get_proposal))
        .route("/v1/proposals/:proposal_id/withdraw", post(withdraw_proposal))
}

/// POST /v1/projects/{project_id}/proposals — Submit a proposal for a team.
#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/proposals",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    request_body = SubmitProposalRequest,
    responses(
        (status = 201, description = "Proposal submitted", body = ProposalView),
        (status = 403, description = "Caller is not a member of the team", body = ErrorBody),
        (status = 409, description = "Project not open", body = ErrorBody),
        (status = 422, description = "Invalid budget or timeline", body = ErrorBody),
    ),
    tag = "proposals"
)]
async fn submit_proposal(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<Uuid>,
    body: Result<Json<SubmitProposalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProposalView>), AppError> {
    let req = extract_json(body)?;
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let proposal = blocking(move || {
        engine.submit_proposal(
            ProjectId::from_uuid(project_id),
            TeamId::from_uuid(req.team_id),
            req.proposed_budget,
            req.proposed_timeline_weeks,
            &actor,
        )
    })
    .await?;
    state.persist_project(&proposal.project_id).await?;
    Ok((StatusCode::CREATED, Json(proposal.into())))
}

/// GET /v1/projects/{project_id}/proposals — Proposals, ranked.
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/proposals",
    params(("project_id" = Uuid, Path, description = "Project ID"), RankingQuery),
    responses(
        (status = 200, description = "Ranked proposals", body = Vec<ProposalView>),
        (status = 404, description = "Unknown project", body = ErrorBody),
        (status = 422, description = "Unknown sort key", body = ErrorBody),
    ),
    tag = "proposals"
)]
async fn list_proposals(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    query: Result<Query<RankingQuery>, QueryRejection>,
) -> Result<Json<Vec<ProposalView>>, AppError> {
    let query = extract_query(query)?;
    let sort = match query.sort.as_deref() {
        Some(raw) => raw.parse::<ProposalSort>()?,
        None => ProposalSort::default(),
    };
    let proposals = state
        .engine
        .list_proposals_ranked(&ProjectId::from_uuid(project_id), sort)?;
    Ok(Json(proposals.into_iter().map(Into::into).collect()))
}

/// GET /v1/projects/{project_id}/proposals/suggested — Cheapest pending proposal.
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/proposals/suggested",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Suggested proposal", body = ProposalView),
        (status = 404, description = "Unknown project or no pending proposal", body = ErrorBody),
    ),
    tag = "proposals"
)]
async fn suggest_proposal(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProposalView>, AppError> {
    let project_id = ProjectId::from_uuid(project_id);
    state
        .engine
        .suggest_best(&project_id)?
        .map(|p| Json(p.into()))
        .ok_or_else(|| AppError::NotFound(format!("no pending proposal on project {project_id}")))
}

/// POST /v1/projects/{project_id}/proposals/{proposal_id}/accept — Accept a proposal.
#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/proposals/{proposal_id}/accept",
    params(
        ("project_id" = Uuid, Path, description = "Project ID"),
        ("proposal_id" = Uuid, Path, description = "Proposal ID"),
    ),
    request_body = AcceptProposalRequest,
    responses(
        (status = 200, description = "Contract for the accepted proposal", body = ContractView),
        (status = 403, description = "Caller is not the project's client", body = ErrorBody),
        (status = 409, description = "Proposal or project not acceptable, or lock timeout", body = ErrorBody),
        (status = 422, description = "Milestone plan exceeds the contract total", body = ErrorBody),
    ),
    tag = "proposals"
)]
async fn accept_proposal(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((project_id, proposal_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<AcceptProposalRequest>, JsonRejection>,
) -> Result<Json<ContractView>, AppError> {
    let req = match body {
        Err(JsonRejection::MissingJsonContentType(_)) => AcceptProposalRequest::default(),
        other => extract_json(other)?,
    };
    let plan: Vec<MilestoneDraft> = req
        .milestones
        .into_iter()
        .map(|m| MilestoneDraft {
            name: m.name,
            amount: m.amount,
            due_date: m.due_date,
        })
        .collect();
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let contract = blocking(move || {
        engine.accept_proposal_with_plan(
            ProjectId::from_uuid(project_id),
            ProposalId::from_uuid(proposal_id),
            &plan,
            &actor,
        )
    })
    .await?;
    state.persist_project(&contract.project_id).await?;
    Ok(Json(contract.into()))
}

/// GET /v1/proposals/{proposal_id} — Look up a proposal.
#[utoipa::path(
    get,
    path = "/v1/proposals/{proposal_id}",
    params(("proposal_id" = Uuid, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Proposal", body = ProposalView),
        (status = 404, description = "Unknown proposal", body = ErrorBody),
    ),
    tag = "proposals"
)]
async fn get_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ProposalView>, AppError> {
    let proposal = state
        .engine
        .get_proposal(&ProposalId::from_uuid(proposal_id))?;
    Ok(Json(proposal.into()))
}

/// POST /v1/proposals/{proposal_id}/withdraw — Withdraw a pending proposal.
#[utoipa::path(
    post,
    path = "/v1/proposals/{proposal_id}/withdraw",
    params(("proposal_id" = Uuid, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Proposal withdrawn", body = ProposalView),
        (status = 403, description = "Caller is not a member of the team", body = ErrorBody),
        (status = 409, description = "Proposal no longer pending", body = ErrorBody),
    ),
    tag = "proposals"
)]
async fn withdraw_proposal(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ProposalView>, AppError> {
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let proposal = blocking(move || {
        engine.withdraw_proposal(ProposalId::from_uuid(proposal_id), &actor)
    })
    .await?;
    state.persist_project(&proposal.project_id).await?;
    Ok(Json(proposal.into()))
}
