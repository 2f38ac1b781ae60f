//! # Engine Error Taxonomy
//!
//! Every command returns either the updated entity or an [`EngineError`].
//! Variants carry enough context for the caller to tell the user what was
//! wrong: the entity, its current state, what the operation needed, and
//! the amounts involved.

use thiserror::Error;

use guild_core::ValidationError;
use guild_escrow::EscrowError;
use guild_state::TransitionError;

/// Errors returned by engine commands and queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Actor lacks the role this operation requires on this entity.
    #[error("forbidden: {operation} requires the {required}")]
    Forbidden {
        /// The attempted operation.
        operation: &'static str,
        /// Role description, e.g. "project's client".
        required: &'static str,
    },

    /// Operation not legal from the entity's current status.
    #[error("{entity} {id} is {current}; {operation} requires {required}")]
    InvalidState {
        /// Entity kind.
        entity: &'static str,
        /// Entity identifier.
        id: String,
        /// Current status.
        current: String,
        /// Required status or condition.
        required: String,
        /// The attempted operation.
        operation: &'static str,
    },

    /// Milestone or escrow state machine rejected the move.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Monetary amount violates an invariant.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Deposit does not equal the contract total.
    #[error("amount mismatch on contract {contract_id}: expected {expected}, got {provided}")]
    AmountMismatch {
        /// Contract identifier.
        contract_id: String,
        /// Contract total.
        expected: i64,
        /// Amount offered.
        provided: i64,
    },

    /// Release attempted on an unfunded escrow.
    #[error("insufficient funds on contract {contract_id}: requested {requested}, held {held}")]
    InsufficientFunds {
        /// Contract identifier.
        contract_id: String,
        /// Amount requested.
        requested: i64,
        /// Amount held.
        held: i64,
    },

    /// Lock acquisition timed out; safe to retry unchanged.
    #[error("conflict: {resource} is being modified concurrently, retry")]
    Conflict {
        /// The contended resource.
        resource: String,
    },

    /// Non-monetary input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Conflict { .. } => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Whether the caller may retry the same command unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Convert a status-machine rejection on a project, proposal, contract or
    /// dispute into `InvalidState`.
    pub(crate) fn invalid_state(
        entity: &'static str,
        id: impl std::fmt::Display,
        operation: &'static str,
        required: impl Into<String>,
        err: &TransitionError,
    ) -> Self {
        Self::InvalidState {
            entity,
            id: id.to_string(),
            current: err.current_state().to_string(),
            required: required.into(),
            operation,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::NonPositiveAmount(_)
            | ValidationError::AmountOverflow(_)
            | ValidationError::InvalidFeeRate(_)
            | ValidationError::InvalidBudgetRange { .. } => Self::InvalidAmount(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<EscrowError> for EngineError {
    fn from(err: EscrowError) -> Self {
        match err {
            EscrowError::Transition(t) => Self::InvalidTransition(t),
            EscrowError::AmountMismatch {
                contract_id,
                expected,
                provided,
            } => Self::AmountMismatch {
                contract_id,
                expected,
                provided,
            },
            EscrowError::InsufficientFunds {
                contract_id,
                requested,
                held,
            } => Self::InsufficientFunds {
                contract_id,
                requested,
                held,
            },
            EscrowError::ReleaseBoundExceeded { .. } | EscrowError::InvalidAmount(_) => {
                Self::InvalidAmount(err.to_string())
            }
            EscrowError::Validation(v) => v.into(),
            EscrowError::OutcomeMismatch { .. } => Self::Validation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = EngineError::not_found("project", "p-1");
        assert_eq!(format!("{err}"), "project p-1 not found");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn invalid_state_mentions_current_and_required() {
        let err = EngineError::InvalidState {
            entity: "milestone",
            id: "m-1".into(),
            current: "approved".into(),
            required: "review".into(),
            operation: "review",
        };
        let msg = format!("{err}");
        assert!(msg.contains("is approved"));
        assert!(msg.contains("requires review"));
    }

    #[test]
    fn conflict_is_retryable() {
        let err = EngineError::Conflict {
            resource: "project:p-1".into(),
        };
        assert!(err.is_retryable());
        assert!(!EngineError::InvalidAmount("x".into()).is_retryable());
    }

    #[test]
    fn escrow_mismatch_maps_to_amount_mismatch() {
        let err: EngineError = EscrowError::AmountMismatch {
            contract_id: "c".into(),
            expected: 10,
            provided: 9,
        }
        .into();
        assert_eq!(err.code(), "AMOUNT_MISMATCH");
    }

    #[test]
    fn escrow_bound_maps_to_invalid_amount() {
        let err: EngineError = EscrowError::ReleaseBoundExceeded {
            contract_id: "c".into(),
            requested: 5,
            released: 10,
            total: 12,
        }
        .into();
        assert_eq!(err.code(), "INVALID_AMOUNT");
    }

    #[test]
    fn validation_amount_errors_map_to_invalid_amount() {
        let err: EngineError = ValidationError::NonPositiveAmount(0).into();
        assert_eq!(err.code(), "INVALID_AMOUNT");
        let err: EngineError = ValidationError::EmptyField("name").into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
