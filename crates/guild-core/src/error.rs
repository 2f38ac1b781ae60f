//! # Validation Errors
//!
//! Errors raised when a domain primitive is constructed from invalid input.
//! Each variant carries the offending value so callers can report it
//! without re-deriving context.

use thiserror::Error;

/// Domain primitive validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A monetary amount was zero or negative where a positive value is required.
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    /// Checked arithmetic on amounts overflowed.
    #[error("amount arithmetic overflowed: {0}")]
    AmountOverflow(String),

    /// Fee rate outside 0..=10000 basis points.
    #[error("fee rate must be between 0 and 10000 basis points, got {0}")]
    InvalidFeeRate(u32),

    /// Budget range with min above max.
    #[error("invalid budget range: min {min} exceeds max {max}")]
    InvalidBudgetRange {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },

    /// A required text field was empty.
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    /// A count that must be at least one was zero.
    #[error("field '{0}' must be at least 1")]
    ZeroCount(&'static str),

    /// Timestamp string failed to parse.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The raw input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },
}
