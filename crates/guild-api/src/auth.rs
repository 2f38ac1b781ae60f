//! # Authentication Middleware
//!
//! Bearer tokens encode the caller's role and user id:
//!
//! ```text
//! Bearer {role}:{user_id}:{secret}
//! ```
//!
//! `role` is `user` or `arbitrator`. Team memberships are not part of the
//! token; handlers resolve them through the team directory when they turn
//! a [`CallerIdentity`] into an engine [`Actor`].
//!
//! When no secret is configured (development mode) the secret segment is
//! optional and not checked, but the role and user id are still required.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

use guild_core::{Actor, UserId};
use guild_engine::TeamDirectory;

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// Caller roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Client or team member; capabilities come from ownership and membership.
    User,
    /// Platform arbitration.
    Arbitrator,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Arbitrator => "arbitrator",
        }
    }
}

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The caller's role.
    pub role: Role,
    /// The calling user.
    pub user_id: UserId,
}

impl CallerIdentity {
    /// Resolve team memberships and build the engine actor.
    pub fn actor(&self, directory: &dyn TeamDirectory) -> Actor {
        directory.actor_for(self.user_id, self.role == Role::Arbitrator)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared secret; `None` disables the secret check.
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token of the form `{role}:{user_id}:{secret}`.
///
/// With `expected_secret = None` the secret segment may be omitted.
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    let (role_str, user_str) = match (parts.as_slice(), expected_secret) {
        ([role, user, secret], Some(expected)) => {
            if !constant_time_token_eq(secret, expected) {
                return Err("invalid bearer token".into());
            }
            (*role, *user)
        }
        ([role, user, _], None) | ([role, user], None) => (*role, *user),
        _ => return Err("invalid token format, expected {role}:{user_id}:{secret}".into()),
    };

    let role = match role_str {
        "user" => Role::User,
        "arbitrator" => Role::Arbitrator,
        other => return Err(format!("unknown role: {other}")),
    };

    let user_id = user_str
        .parse::<Uuid>()
        .map(UserId::from_uuid)
        .map_err(|e| format!("invalid user_id: {e}"))?;

    Ok(CallerIdentity { role, user_id })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject the [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) if header_value.starts_with("Bearer ") => {
            let provided = &header_value[7..];
            match parse_bearer_token(provided, expected.as_deref()) {
                Ok(identity) => {
                    request.extensions_mut().insert(identity);
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    unauthorized_response(&msg)
                }
            }
        }
        Some(_) => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            unauthorized_response("authorization header must use Bearer scheme")
        }
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn test_app(token: Option<String>) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|caller: CallerIdentity| async move { caller.role.as_str() }),
            )
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(AuthConfig { token }))
    }

    async fn call(app: Router, auth: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn parses_role_and_user() {
        let user = Uuid::new_v4();
        let identity = parse_bearer_token(&format!("arbitrator:{user}:s3cret"), Some("s3cret")).unwrap();
        assert_eq!(identity.role, Role::Arbitrator);
        assert_eq!(identity.user_id, UserId::from_uuid(user));
    }

    #[test]
    fn wrong_secret_rejected() {
        let user = Uuid::new_v4();
        assert!(parse_bearer_token(&format!("user:{user}:nope"), Some("s3cret")).is_err());
    }

    #[test]
    fn secret_optional_when_disabled() {
        let user = Uuid::new_v4();
        assert!(parse_bearer_token(&format!("user:{user}"), None).is_ok());
        assert!(parse_bearer_token(&format!("user:{user}"), Some("s3cret")).is_err());
    }

    #[test]
    fn unknown_role_and_bad_uuid_rejected() {
        let user = Uuid::new_v4();
        assert!(parse_bearer_token(&format!("admin:{user}:x"), None).is_err());
        assert!(parse_bearer_token("user:not-a-uuid:x", None).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = AuthConfig {
            token: Some("hunter2".into()),
        };
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let user = Uuid::new_v4();
        let status = call(
            test_app(Some("s3cret".into())),
            Some(&format!("Bearer user:{user}:s3cret")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        assert_eq!(call(test_app(None), None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn basic_scheme_is_unauthorized() {
        assert_eq!(
            call(test_app(None), Some("Basic Zm9vOmJhcg==")).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
