//! # Request Metrics
//!
//! Atomic request and error counters, exposed in Prometheus text format at
//! `/metrics` together with the engine's event feed position.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Shared metrics state.
#[derive(Debug, Clone)]
pub struct ApiMetrics {
    /// Requests served.
    pub request_count: Arc<AtomicU64>,
    /// Requests answered with a 4xx or 5xx.
    pub error_count: Arc<AtomicU64>,
    /// Requests answered with 409 (state conflicts and lock timeouts).
    pub conflict_count: Arc<AtomicU64>,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            conflict_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return current request count.
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Return current error count.
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Return current conflict count.
    pub fn conflicts(&self) -> u64 {
        self.conflict_count.load(Ordering::Relaxed)
    }

    /// Render counters in Prometheus text exposition format.
    pub fn render(&self, last_event_sequence: u64) -> String {
        format!(
            "# TYPE guild_http_requests_total counter\n\
             guild_http_requests_total {}\n\
             # TYPE guild_http_errors_total counter\n\
             guild_http_errors_total {}\n\
             # TYPE guild_http_conflicts_total counter\n\
             guild_http_conflicts_total {}\n\
             # TYPE guild_events_published_total counter\n\
             guild_events_published_total {}\n",
            self.requests(),
            self.errors(),
            self.conflicts(),
            last_event_sequence,
        )
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that increments request and error counters.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.request_count.fetch_add(1, Ordering::Relaxed);
        let status = response.status();
        if status.is_server_error() || status.is_client_error() {
            m.error_count.fetch_add(1, Ordering::Relaxed);
        }
        if status == axum::http::StatusCode::CONFLICT {
            m.conflict_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[tokio::test]
    async fn counts_requests_errors_and_conflicts() {
        let metrics = ApiMetrics::new();
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/busy", get(|| async { StatusCode::CONFLICT }))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .layer(from_fn(metrics_middleware))
            .layer(axum::Extension(metrics.clone()));

        for uri in ["/ok", "/busy", "/broken"] {
            app.clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
        }

        assert_eq!(metrics.requests(), 3);
        assert_eq!(metrics.errors(), 2);
        assert_eq!(metrics.conflicts(), 1);
    }

    #[test]
    fn render_includes_every_counter() {
        let text = ApiMetrics::new().render(7);
        assert!(text.contains("guild_http_requests_total 0"));
        assert!(text.contains("guild_events_published_total 7"));
    }
}
