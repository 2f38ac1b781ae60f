//! # Milestones & Submissions API
//!
//! Teams start and submit milestones; clients review them. Approving a
//! submission releases the milestone's escrow in the same command.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use guild_core::MilestoneId;

use super::views::{MilestoneView, ReviewView, SubmissionView};
use super::{actor, blocking, persist_milestone};
use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{check_len, extract_validated_json, Validate};
use crate::state::AppState;

const MAX_FILES: usize = 50;

/// Submit-milestone request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitMilestoneRequest {
    #[serde(default)]
    pub note: String,
    /// Opaque file references (storage keys).
    #[serde(default)]
    pub files: Vec<String>,
}

impl Validate for SubmitMilestoneRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("note", &self.note, 10_000)?;
        if self.files.len() > MAX_FILES {
            return Err(format!("at most {MAX_FILES} files per submission"));
        }
        Ok(())
    }
}

/// Review-milestone request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewMilestoneRequest {
    pub approved: bool,
    #[serde(default)]
    pub note: String,
}

impl Validate for ReviewMilestoneRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("note", &self.note, 10_000)
    }
}

/// Build the milestones router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/milestones/:milestone_id", get(get_milestone))
        .route("/v1/milestones/:milestone_id/start", post(start_milestone))
        .route(
            "/v1/milestones/:milestone_id/submissions",
            get(list_submissions).post(submit_milestone),
        )
        .route("/v1/milestones/:milestone_id/review", post(review_milestone))
        .route("/v1/milestones/:milestone_id/reviews", get(list_reviews))
}

/// GET /v1/milestones/{milestone_id} — Look up a milestone.
#[utoipa::path(
    get,
    path = "/v1/milestones/{milestone_id}",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    responses(
        (status = 200, description = "Milestone", body = MilestoneView),
        (status = 404, description = "Unknown milestone", body = ErrorBody),
    ),
    tag = "milestones"
)]
async fn get_milestone(
    State(state): State<AppState>,
    Path(milestone_id): Path<Uuid>,
) -> Result<Json<MilestoneView>, AppError> {
    let milestone = state
        .engine
        .get_milestone(&MilestoneId::from_uuid(milestone_id))?;
    Ok(Json(milestone.into()))
}

/// POST /v1/milestones/{milestone_id}/start — Begin work on a milestone.
#[utoipa::path(
    post,
    path = "/v1/milestones/{milestone_id}/start",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    responses(
        (status = 200, description = "Milestone in progress", body = MilestoneView),
        (status = 403, description = "Caller is not on the contracted team", body = ErrorBody),
        (status = 409, description = "Milestone not pending or contract not active", body = ErrorBody),
    ),
    tag = "milestones"
)]
async fn start_milestone(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(milestone_id): Path<Uuid>,
) -> Result<Json<MilestoneView>, AppError> {
    let milestone_id = MilestoneId::from_uuid(milestone_id);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let milestone = blocking(move || engine.start_milestone(milestone_id, &actor)).await?;
    persist_milestone(&state, &milestone_id).await?;
    Ok(Json(milestone.into()))
}

/// POST /v1/milestones/{milestone_id}/submissions — Submit a result.
#[utoipa::path(
    post,
    path = "/v1/milestones/{milestone_id}/submissions",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    request_body = SubmitMilestoneRequest,
    responses(
        (status = 201, description = "Submission recorded, milestone in review", body = SubmissionView),
        (status = 403, description = "Caller is not on the contracted team", body = ErrorBody),
        (status = 409, description = "Milestone does not accept submissions", body = ErrorBody),
    ),
    tag = "milestones"
)]
async fn submit_milestone(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(milestone_id): Path<Uuid>,
    body: Result<Json<SubmitMilestoneRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionView>), AppError> {
    let req = extract_validated_json(body)?;
    let milestone_id = MilestoneId::from_uuid(milestone_id);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let submission = blocking(move || {
        engine.submit_milestone(milestone_id, &req.note, req.files, &actor)
    })
    .await?;
    persist_milestone(&state, &milestone_id).await?;
    Ok((StatusCode::CREATED, Json(submission.into())))
}

/// GET /v1/milestones/{milestone_id}/submissions — Submissions, newest first.
#[utoipa::path(
    get,
    path = "/v1/milestones/{milestone_id}/submissions",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    responses(
        (status = 200, description = "Submissions", body = Vec<SubmissionView>),
        (status = 404, description = "Unknown milestone", body = ErrorBody),
    ),
    tag = "milestones"
)]
async fn list_submissions(
    State(state): State<AppState>,
    Path(milestone_id): Path<Uuid>,
) -> Result<Json<Vec<SubmissionView>>, AppError> {
    let submissions = state
        .engine
        .list_submissions(&MilestoneId::from_uuid(milestone_id))?;
    Ok(Json(submissions.into_iter().map(Into::into).collect()))
}

/// POST /v1/milestones/{milestone_id}/review — Approve or reject the latest submission.
#[utoipa::path(
    post,
    path = "/v1/milestones/{milestone_id}/review",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    request_body = ReviewMilestoneRequest,
    responses(
        (status = 200, description = "Milestone approved (and paid) or rejected", body = MilestoneView),
        (status = 403, description = "Caller is not the client", body = ErrorBody),
        (status = 409, description = "Milestone not in review, escrow on hold, or lock timeout", body = ErrorBody),
    ),
    tag = "milestones"
)]
async fn review_milestone(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(milestone_id): Path<Uuid>,
    body: Result<Json<ReviewMilestoneRequest>, JsonRejection>,
) -> Result<Json<MilestoneView>, AppError> {
    let req = extract_validated_json(body)?;
    let milestone_id = MilestoneId::from_uuid(milestone_id);
    let actor = actor(&state, &caller);
    let engine = state.engine.clone();
    let milestone = blocking(move || {
        engine.review_milestone(milestone_id, req.approved, &req.note, &actor)
    })
    .await?;
    persist_milestone(&state, &milestone_id).await?;
    Ok(Json(milestone.into()))
}

/// GET /v1/milestones/{milestone_id}/reviews — Reviews, newest first.
#[utoipa::path(
    get,
    path = "/v1/milestones/{milestone_id}/reviews",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    responses(
        (status = 200, description = "Reviews", body = Vec<ReviewView>),
        (status = 404, description = "Unknown milestone", body = ErrorBody),
    ),
    tag = "milestones"
)]
async fn list_reviews(
    State(state): State<AppState>,
    Path(milestone_id): Path<Uuid>,
) -> Result<Json<Vec<ReviewView>>, AppError> {
    let reviews = state
        .engine
        .list_reviews(&MilestoneId::from_uuid(milestone_id))?;
    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}
