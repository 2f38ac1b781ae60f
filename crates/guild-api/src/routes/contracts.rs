//! # Contracts & Escrow API
//!
//! Contract lookup, the escrow commands, and milestone allocation. Escrow
//! responses always carry the full `{total, released, held, status}`
//! summary plus the ledger.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use guild_core::ContractId;

use super::views::{ContractView, EscrowView, MilestoneView};
use super::{actor, blocking, persist_contract};
use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{check_len, extract_json, extract_validated_json, Validate};
use crate::state::AppState;

/// Fund-escrow request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FundEscrowRequest {
    /// Deposit, minor units. Must equal the contract total.
    pub amount: i64,
}

/// Reason for a hold, hold release, or refund.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EscrowReasonRequest {
    pub reason: String,
}

impl Validate for EscrowReasonRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("reason", &self.reason, 2_000)
    }
}

/// Add-milestone request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMilestoneRequest {
    pub name: String,
    /// Payout, minor units.
    pub amount: i64,
    #[serde(default)]
    pub due_date: Option<chrono::NaiveDate>,
}

impl Validate for AddMilestoneRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("name", &self.name, 200)
    }
}

/// Build the contracts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/contracts/:contract_id", get(get_contract))
        .route("/v1/contracts/:contract_id/escrow", get(get_escrow))
        .route("/v1/contracts/:contract_id/escrow/fund", post(fund_escrow))
        .route("/v1/contracts/:contract_id/escrow/hold", post(hold_escrow))
        .route(
            "/v1/contracts/:contract_id/escrow/release-hold",
            post(release_hold),
        )
        .route("/v1/contracts/:contract_id/escrow/refund", post(refund_escrow))
        .route(
            "/v1/contracts/:contract_id/milestones",
            get(list_milestones).post(add_milestone),
        )
}

fn escrow_view(state: &AppState, contract_id: &ContractId) -> Result<Json<EscrowView>, AppError> {
    let contract = state.engine.get_contract(contract_id)?;
    Ok(Json(EscrowView::from(&contract)))
}

/// GET /v1/contracts/{contract_id} — Look up a contract.
#[utoipa::path(
    get,
    path = "/v1/contracts/{contract_id}",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Contract", body = ContractView),
        (status = 404, description = "Unknown contract", body = ErrorBody),
    ),
    tag = "contracts"
)]
async fn get_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<ContractView>, AppError> {
    let contract = state
        .engine
        .get_contract(&ContractId::from_uuid(contract_id))?;
    Ok(Json(contract.into()))
}

/// GET /v1/contracts/{contract_id}/escrow — Escrow summary and ledger.
#[utoipa::path(
    get,
    path = "/v1/contracts/{contract_id}/escrow",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Escrow", body = EscrowView),
        (status = 404, description = "Unknown contract", body = ErrorBody),
    ),
    tag = "escrow"
)]
async fn get_escrow(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<EscrowView>, AppError> {
    escrow_view(&state, &ContractId::from_uuid(contract_id))
}

/// POST /v1/contracts/{contract_id}/escrow/fund — Deposit the contract total.
#[utoipa::path(
    post,
    path = "/v1/contracts/{contract_id}/escrow/fund",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    request_body = FundEscrowRequest,
    responses(
        (status = 200, description = "Escrow funded", body = EscrowView),
        (status = 403, description = "Caller is not the client", body = ErrorBody),
        (status = 409, description = "Escrow not pending", body = ErrorBody),
        (status = 422, description = "Deposit does not match the total", body = ErrorBody),
    ),
    tag = "escrow"
)]
async fn fund_escrow(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(contract_id): Path<Uuid>,
    body: Result<Json<FundEscrowRequest>, JsonRejection>,
) -> Result<Json<EscrowView>, AppError> {
    let req = extract_json(body)?;
    let contract_id = ContractId::from_uuid(contract_id);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    blocking(move || engine.fund_escrow(contract_id, req.amount, &actor)).await?;
    persist_contract(&state, &contract_id).await?;
    escrow_view(&state, &contract_id)
}

/// POST /v1/contracts/{contract_id}/escrow/hold — Freeze releases.
#[utoipa::path(
    post,
    path = "/v1/contracts/{contract_id}/escrow/hold",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    request_body = EscrowReasonRequest,
    responses(
        (status = 200, description = "Escrow on hold", body = EscrowView),
        (status = 403, description = "Caller is neither client nor arbitrator", body = ErrorBody),
        (status = 409, description = "Escrow not funded", body = ErrorBody),
    ),
    tag = "escrow"
)]
async fn hold_escrow(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(contract_id): Path<Uuid>,
    body: Result<Json<EscrowReasonRequest>, JsonRejection>,
) -> Result<Json<EscrowView>, AppError> {
    let req = extract_validated_json(body)?;
    let contract_id = ContractId::from_uuid(contract_id);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    blocking(move || engine.hold_escrow(contract_id, &req.reason, &actor)).await?;
    persist_contract(&state, &contract_id).await?;
    escrow_view(&state, &contract_id)
}

/// POST /v1/contracts/{contract_id}/escrow/release-hold — Lift a hold.
#[utoipa::path(
    post,
    path = "/v1/contracts/{contract_id}/escrow/release-hold",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    request_body = EscrowReasonRequest,
    responses(
        (status = 200, description = "Hold lifted", body = EscrowView),
        (status = 403, description = "Caller is neither client nor arbitrator", body = ErrorBody),
        (status = 409, description = "Escrow not on hold", body = ErrorBody),
    ),
    tag = "escrow"
)]
async fn release_hold(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(contract_id): Path<Uuid>,
    body: Result<Json<EscrowReasonRequest>, JsonRejection>,
) -> Result<Json<EscrowView>, AppError> {
    let req = extract_validated_json(body)?;
    let contract_id = ContractId::from_uuid(contract_id);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    blocking(move || engine.release_hold(contract_id, &req.reason, &actor)).await?;
    persist_contract(&state, &contract_id).await?;
    escrow_view(&state, &contract_id)
}

/// POST /v1/contracts/{contract_id}/escrow/refund — Refund the held balance.
#[utoipa::path(
    post,
    path = "/v1/contracts/{contract_id}/escrow/refund",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    request_body = EscrowReasonRequest,
    responses(
        (status = 200, description = "Escrow refunded, contract terminated", body = EscrowView),
        (status = 403, description = "Caller is not an arbitrator", body = ErrorBody),
        (status = 409, description = "Escrow not refundable", body = ErrorBody),
    ),
    tag = "escrow"
)]
async fn refund_escrow(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(contract_id): Path<Uuid>,
    body: Result<Json<EscrowReasonRequest>, JsonRejection>,
) -> Result<Json<EscrowView>, AppError> {
    let req = extract_validated_json(body)?;
    let contract_id = ContractId::from_uuid(contract_id);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    blocking(move || engine.refund_escrow(contract_id, &req.reason, &actor)).await?;
    persist_contract(&state, &contract_id).await?;
    escrow_view(&state, &contract_id)
}

/// GET /v1/contracts/{contract_id}/milestones — Milestones in display order.
#[utoipa::path(
    get,
    path = "/v1/contracts/{contract_id}/milestones",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Milestones", body = Vec<MilestoneView>),
        (status = 404, description = "Unknown contract", body = ErrorBody),
    ),
    tag = "milestones"
)]
async fn list_milestones(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<Vec<MilestoneView>>, AppError> {
    let milestones = state
        .engine
        .list_milestones(&ContractId::from_uuid(contract_id))?;
    Ok(Json(milestones.into_iter().map(Into::into).collect()))
}

/// POST /v1/contracts/{contract_id}/milestones — Append a milestone.
#[utoipa::path(
    post,
    path = "/v1/contracts/{contract_id}/milestones",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    request_body = AddMilestoneRequest,
    responses(
        (status = 201, description = "Milestone added", body = MilestoneView),
        (status = 403, description = "Caller is not a party to the contract", body = ErrorBody),
        (status = 409, description = "Contract closed for milestones", body = ErrorBody),
        (status = 422, description = "Amount would exceed the contract total", body = ErrorBody),
    ),
    tag = "milestones"
)]
async fn add_milestone(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(contract_id): Path<Uuid>,
    body: Result<Json<AddMilestoneRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MilestoneView>), AppError> {
    let req = extract_validated_json(body)?;
    let contract_id = ContractId::from_uuid(contract_id);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let milestone = blocking(move || {
        engine.add_milestone(contract_id, &req.name, req.amount, req.due_date, &actor)
    })
    .await?;
    persist_contract(&state, &contract_id).await?;
    Ok((StatusCode::CREATED, Json(milestone.into())))
}
