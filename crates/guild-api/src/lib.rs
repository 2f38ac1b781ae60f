//! # guild-api — HTTP Service for the Guild Marketplace
//!
//! Exposes the engagement engine over Axum. Handlers translate requests
//! into engine commands and engine errors into structured responses; no
//! marketplace rule lives here.
//!
//! ## Routes
//!
//! | Prefix                         | Component                               |
//! |--------------------------------|-----------------------------------------|
//! | `/v1/projects`                 | projects, proposal ranking, acceptance  |
//! | `/v1/proposals`                | proposal lookup and withdrawal          |
//! | `/v1/contracts`                | contracts, escrow, milestone plan       |
//! | `/v1/milestones`               | submissions and reviews                 |
//! | `/v1/disputes`                 | arbitration                             |
//! | `/v1/events`                   | change feed                             |
//! | `/v1/teams`                    | team directory                          |
//! | `/openapi.json`                | OpenAPI document                        |
//! | `/health/*`, `/metrics`        | health and counters (unauthenticated)   |
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsLayer → AuthLayer → handler
//!
//! ## Persistence
//!
//! With `DATABASE_URL` set, every successful command writes the touched
//! project (and everything under it) through to Postgres, and startup
//! restores the engine from it.

pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;

/// Assemble the application router.
///
/// Health checks and `/metrics` sit outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    let api = Router::new()
        .merge(routes::projects::router())
        .merge(routes::proposals::router())
        .merge(routes::contracts::router())
        .merge(routes::milestones::router())
        .merge(routes::disputes::router())
        .merge(routes::events::router())
        .merge(routes::teams::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(Extension(metrics.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .layer(Extension(metrics))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics — Prometheus text exposition.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        metrics.render(state.feed.last_sequence()),
    )
}

/// Liveness check.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check. Returns 503 when the database is configured but
/// unreachable, or when committed projects are still waiting to be written.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
        if state.flush_pending().await > 0 {
            return (StatusCode::SERVICE_UNAVAILABLE, "writes pending").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
