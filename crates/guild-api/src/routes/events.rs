//! # Events API
//!
//! Polling access to the change feed. Consumers pass the last sequence
//! number they saw and receive everything newer.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use super::views::EventView;
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

/// Feed query.
#[derive(Debug, Deserialize, IntoParams)]
pub struct FeedQuery {
    /// Return events with a sequence number greater than this (default 0).
    #[serde(default)]
    pub after: u64,
}

/// Build the events router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events", get(list_events))
}

/// GET /v1/events — Change feed since a sequence number.
#[utoipa::path(
    get,
    path = "/v1/events",
    params(FeedQuery),
    responses((status = 200, description = "Events, oldest first", body = Vec<EventView>)),
    tag = "events"
)]
async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<Vec<EventView>>, AppError> {
    let query = extract_query(query)?;
    Ok(Json(
        state
            .feed
            .since(query.after)
            .into_iter()
            .map(Into::into)
            .collect(),
    ))
}
