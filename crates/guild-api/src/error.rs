//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Engine errors keep their machine-readable code and carry their context
//! (current status, required status, amounts) in `details`. Internal
//! error messages never reach the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use guild_engine::EngineError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// The error.
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "INVALID_STATE").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rejected by the engine; status and code follow the engine taxonomy.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Engine(err) => (engine_status(err), err.code()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        let Self::Engine(err) = self else {
            return None;
        };
        match err {
            EngineError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            EngineError::Forbidden {
                operation,
                required,
            } => Some(json!({ "operation": operation, "required": required })),
            EngineError::InvalidState {
                entity,
                id,
                current,
                required,
                operation,
            } => Some(json!({
                "entity": entity,
                "id": id,
                "current": current,
                "required": required,
                "operation": operation,
            })),
            EngineError::AmountMismatch {
                contract_id,
                expected,
                provided,
            } => Some(json!({
                "contract_id": contract_id,
                "expected": expected,
                "provided": provided,
            })),
            EngineError::InsufficientFunds {
                contract_id,
                requested,
                held,
            } => Some(json!({
                "contract_id": contract_id,
                "requested": requested,
                "held": held,
            })),
            EngineError::Conflict { resource } => {
                Some(json!({ "resource": resource, "retry": true }))
            }
            EngineError::InvalidTransition(_)
            | EngineError::InvalidAmount(_)
            | EngineError::Validation(_) => None,
        }
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::Forbidden { .. } => StatusCode::FORBIDDEN,
        EngineError::InvalidState { .. }
        | EngineError::InvalidTransition(_)
        | EngineError::Conflict { .. } => StatusCode::CONFLICT,
        EngineError::InvalidAmount(_)
        | EngineError::AmountMismatch { .. }
        | EngineError::InsufficientFunds { .. }
        | EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Engine(e) => tracing::warn!(code = e.code(), error = %e, "command refused"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(&self, Self::Engine(EngineError::Conflict { .. })) {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}

impl From<guild_core::ValidationError> for AppError {
    fn from(err: guild_core::ValidationError) -> Self {
        Self::Engine(err.into())
    }
}
