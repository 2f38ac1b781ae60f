//! # Teams API
//!
//! Read access to the team directory, plus an arbitrator-only upsert used
//! by operators to maintain membership and reputation.

use std::collections::BTreeSet;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use guild_core::{TeamId, UserId};
use guild_engine::{TeamDirectory, TeamProfile};

use super::views::TeamView;
use crate::auth::{CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::extractors::{check_len, extract_validated_json, Validate};
use crate::state::AppState;

/// Upsert-team request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertTeamRequest {
    pub name: String,
    /// Average rating times 100.
    #[serde(default)]
    pub rating: u32,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub members: Vec<Uuid>,
}

impl Validate for UpsertTeamRequest {
    fn validate(&self) -> Result<(), String> {
        check_len("name", &self.name, 200)
    }
}

/// Build the teams router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/teams", get(list_teams))
        .route("/v1/teams/:team_id", get(get_team).put(upsert_team))
}

/// GET /v1/teams — Known teams.
#[utoipa::path(
    get,
    path = "/v1/teams",
    responses((status = 200, description = "Teams", body = Vec<TeamView>)),
    tag = "teams"
)]
async fn list_teams(State(state): State<AppState>) -> Json<Vec<TeamView>> {
    let mut teams = state.directory.list();
    teams.sort_by(|a, b| a.name.cmp(&b.name));
    Json(teams.into_iter().map(Into::into).collect())
}

/// GET /v1/teams/{team_id} — Look up a team.
#[utoipa::path(
    get,
    path = "/v1/teams/{team_id}",
    params(("team_id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team", body = TeamView),
        (status = 404, description = "Unknown team", body = ErrorBody),
    ),
    tag = "teams"
)]
async fn get_team(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<TeamView>, AppError> {
    let team_id = TeamId::from_uuid(team_id);
    state
        .directory
        .profile(&team_id)
        .map(|p| Json(p.into()))
        .ok_or_else(|| AppError::NotFound(format!("team {team_id} not found")))
}

/// PUT /v1/teams/{team_id} — Insert or replace a team profile.
#[utoipa::path(
    put,
    path = "/v1/teams/{team_id}",
    params(("team_id" = Uuid, Path, description = "Team ID")),
    request_body = UpsertTeamRequest,
    responses(
        (status = 200, description = "Team stored", body = TeamView),
        (status = 403, description = "Caller is not an arbitrator", body = ErrorBody),
    ),
    tag = "teams"
)]
async fn upsert_team(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(team_id): Path<Uuid>,
    body: Result<Json<UpsertTeamRequest>, JsonRejection>,
) -> Result<Json<TeamView>, AppError> {
    if caller.role != Role::Arbitrator {
        return Err(AppError::Forbidden(
            "only arbitrators may edit teams".to_string(),
        ));
    }
    let req = extract_validated_json(body)?;
    let profile = TeamProfile {
        team_id: TeamId::from_uuid(team_id),
        name: req.name,
        rating: req.rating,
        level: req.level,
        members: req
            .members
            .into_iter()
            .map(UserId::from_uuid)
            .collect::<BTreeSet<_>>(),
    };
    state.directory.upsert(profile.clone());
    tracing::info!(team_id = %profile.team_id, by = %caller.user_id, "team profile stored");
    Ok(Json(profile.into()))
}
