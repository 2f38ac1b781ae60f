//! # Disputes API
//!
//! Either party files a dispute against a contract or one of its
//! milestones; arbitrators review and resolve it. Resolution applies the
//! outcome (release, refund, or milestone status) in the same command.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use guild_core::{ContractId, DisputeId, MilestoneId};
use guild_engine::DisputeOutcome;

use super::views::DisputeView;
use super::{actor, blocking, persist_contract};
use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{check_len, extract_query, extract_validated_json, Validate};
use crate::state::AppState;

const MAX_EVIDENCE: usize = 50;

/// File-dispute request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FileDisputeRequest {
    /// Disputed milestone; omit to dispute the contract as a whole.
    #[serde(default)]
    pub milestone_id: Option<Uuid>,
    pub reason: String,
    /// Opaque evidence references.
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Validate for FileDisputeRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("reason", &self.reason, 5_000)?;
        if self.evidence.len() > MAX_EVIDENCE {
            return Err(format!("at most {MAX_EVIDENCE} evidence references"));
        }
        Ok(())
    }
}

/// Resolve-dispute request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveDisputeRequest {
    /// `approve_milestone`, `reject_milestone`, `resume_milestone`,
    /// `dismiss` or `refund`.
    #[schema(value_type = String)]
    pub outcome: DisputeOutcome,
    #[serde(default)]
    pub note: Option<String>,
}

impl Validate for ResolveDisputeRequest {
    fn validate(&self) -> Result<(), String> {
        match &self.note {
            Some(note) => check_len("note", note, 5_000),
            None => Ok(()),
        }
    }
}

/// Open-disputes query.
#[derive(Debug, Deserialize, IntoParams)]
pub struct OpenDisputesQuery {
    /// Only disputes filed at least this many hours ago.
    #[serde(default)]
    pub older_than_hours: Option<u32>,
}

/// Build the disputes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/contracts/:contract_id/disputes",
            get(list_disputes).post(file_dispute),
        )
        .route("/v1/disputes/open", get(list_open_disputes))
        .route("/v1/disputes/:dispute_id", get(get_dispute))
        .route("/v1/disputes/:dispute_id/review", post(begin_review))
        .route("/v1/disputes/:dispute_id/resolve", post(resolve_dispute))
}

/// POST /v1/contracts/{contract_id}/disputes — File a dispute.
#[utoipa::path(
    post,
    path = "/v1/contracts/{contract_id}/disputes",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    request_body = FileDisputeRequest,
    responses(
        (status = 201, description = "Dispute filed", body = DisputeView),
        (status = 403, description = "Caller is not a party to the contract", body = ErrorBody),
        (status = 404, description = "Milestone not part of the contract", body = ErrorBody),
        (status = 409, description = "Contract not active or milestone not disputable", body = ErrorBody),
    ),
    tag = "disputes"
)]
async fn file_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(contract_id): Path<Uuid>,
    body: Result<Json<FileDisputeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DisputeView>), AppError> {
    let req = extract_validated_json(body)?;
    let contract_id = ContractId::from_uuid(contract_id);
    let milestone_id = req.milestone_id.map(MilestoneId::from_uuid);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let dispute = blocking(move || {
        engine.file_dispute(contract_id, milestone_id, &req.reason, req.evidence, &actor)
    })
    .await?;
    persist_contract(&state, &contract_id).await?;
    Ok((StatusCode::CREATED, Json(dispute.into())))
}

/// GET /v1/contracts/{contract_id}/disputes — Disputes of a contract.
#[utoipa::path(
    get,
    path = "/v1/contracts/{contract_id}/disputes",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Disputes, oldest first", body = Vec<DisputeView>),
        (status = 404, description = "Unknown contract", body = ErrorBody),
    ),
    tag = "disputes"
)]
async fn list_disputes(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<Vec<DisputeView>>, AppError> {
    let disputes = state
        .engine
        .list_disputes(&ContractId::from_uuid(contract_id))?;
    Ok(Json(disputes.into_iter().map(Into::into).collect()))
}

/// GET /v1/disputes/open — Unresolved disputes, for escalation.
#[utoipa::path(
    get,
    path = "/v1/disputes/open",
    params(OpenDisputesQuery),
    responses((status = 200, description = "Open disputes", body = Vec<DisputeView>)),
    tag = "disputes"
)]
async fn list_open_disputes(
    State(state): State<AppState>,
    query: Result<Query<OpenDisputesQuery>, QueryRejection>,
) -> Result<Json<Vec<DisputeView>>, AppError> {
    let query = extract_query(query)?;
    let older_than = chrono::Duration::hours(i64::from(query.older_than_hours.unwrap_or(0)));
    Ok(Json(
        state
            .engine
            .list_open_disputes(older_than)
            .into_iter()
            .map(Into::into)
            .collect(),
    ))
}

/// GET /v1/disputes/{dispute_id} — Look up a dispute.
#[utoipa::path(
    get,
    path = "/v1/disputes/{dispute_id}",
    params(("dispute_id" = Uuid, Path, description = "Dispute ID")),
    responses(
        (status = 200, description = "Dispute", body = DisputeView),
        (status = 404, description = "Unknown dispute", body = ErrorBody),
    ),
    tag = "disputes"
)]
async fn get_dispute(
    State(state): State<AppState>,
    Path(dispute_id): Path<Uuid>,
) -> Result<Json<DisputeView>, AppError> {
    let dispute = state.engine.get_dispute(&DisputeId::from_uuid(dispute_id))?;
    Ok(Json(dispute.into()))
}

/// POST /v1/disputes/{dispute_id}/review — Arbitrator picks up a dispute.
#[utoipa::path(
    post,
    path = "/v1/disputes/{dispute_id}/review",
    params(("dispute_id" = Uuid, Path, description = "Dispute ID")),
    responses(
        (status = 200, description = "Dispute under review", body = DisputeView),
        (status = 403, description = "Caller is not an arbitrator", body = ErrorBody),
        (status = 409, description = "Dispute not open", body = ErrorBody),
    ),
    tag = "disputes"
)]
async fn begin_review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(dispute_id): Path<Uuid>,
) -> Result<Json<DisputeView>, AppError> {
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let dispute = blocking(move || {
        engine.begin_dispute_review(DisputeId::from_uuid(dispute_id), &actor)
    })
    .await?;
    persist_contract(&state, &dispute.contract_id).await?;
    Ok(Json(dispute.into()))
}

/// POST /v1/disputes/{dispute_id}/resolve — Decide a dispute.
#[utoipa::path(
    post,
    path = "/v1/disputes/{dispute_id}/resolve",
    params(("dispute_id" = Uuid, Path, description = "Dispute ID")),
    request_body = ResolveDisputeRequest,
    responses(
        (status = 200, description = "Dispute resolved, outcome applied", body = DisputeView),
        (status = 403, description = "Caller is not an arbitrator", body = ErrorBody),
        (status = 409, description = "Dispute already resolved or escrow refuses the outcome", body = ErrorBody),
        (status = 422, description = "Outcome does not fit the dispute", body = ErrorBody),
    ),
    tag = "disputes"
)]
async fn resolve_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(dispute_id): Path<Uuid>,
    body: Result<Json<ResolveDisputeRequest>, JsonRejection>,
) -> Result<Json<DisputeView>, AppError> {
    let req = extract_validated_json(body)?;
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let dispute = blocking(move || {
        engine.resolve_dispute(DisputeId::from_uuid(dispute_id), req.outcome, req.note, &actor)
    })
    .await?;
    persist_contract(&state, &dispute.contract_id).await?;
    Ok(Json(dispute.into()))
}
