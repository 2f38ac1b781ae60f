//! # Escrow Error Types
//!
//! Every variant carries the identifier of the account or dispute and the
//! values that caused the rejection.

use thiserror::Error;

use guild_core::ValidationError;
use guild_state::TransitionError;

/// Errors arising from escrow and dispute operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// Operation not allowed from the current status.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Deposit does not equal the contract total.
    #[error("escrow {contract_id} expects a deposit of {expected}, got {provided}")]
    AmountMismatch {
        /// Contract owning the escrow.
        contract_id: String,
        /// Contract total.
        expected: i64,
        /// Amount offered.
        provided: i64,
    },

    /// Release attempted before the escrow was funded.
    #[error("escrow {contract_id} has insufficient funds: requested {requested}, held {held}")]
    InsufficientFunds {
        /// Contract owning the escrow.
        contract_id: String,
        /// Amount requested for release.
        requested: i64,
        /// Amount currently held.
        held: i64,
    },

    /// Release would push the released amount above the contract total.
    #[error(
        "release of {requested} on escrow {contract_id} exceeds bound: released {released}, total {total}"
    )]
    ReleaseBoundExceeded {
        /// Contract owning the escrow.
        contract_id: String,
        /// Amount requested for release.
        requested: i64,
        /// Amount already released.
        released: i64,
        /// Contract total.
        total: i64,
    },

    /// Amount is malformed for the operation (e.g. zero release).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Input failed primitive validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Resolution outcome does not fit what the dispute targets.
    #[error("dispute {dispute_id} targets a {target}; outcome {outcome} does not apply")]
    OutcomeMismatch {
        /// The dispute identifier.
        dispute_id: String,
        /// The attempted outcome.
        outcome: String,
        /// "milestone" or "contract".
        target: String,
    },
}
