#![deny(missing_docs)]

//! # guild-core — Foundational Types for the Guild Marketplace Engine
//!
//! This crate defines the primitives every other crate in the workspace
//! depends on. It has no internal crate dependencies, only `serde`,
//! `thiserror`, `chrono`, and `uuid` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`ContractId`]
//!    where a [`MilestoneId`] is expected.
//!
//! 2. **Money is integer minor units.** [`Amount`] wraps an `i64` and every
//!    arithmetic operation is checked. Floats never appear in monetary paths.
//!
//! 3. **Explicit actors.** Every command takes an [`Actor`] carrying the
//!    caller's capabilities. There is no ambient "current user".
//!
//! 4. **Structured errors.** [`ValidationError`] via `thiserror`, no
//!    `.unwrap()` outside tests.

pub mod actor;
pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use actor::Actor;
pub use error::ValidationError;
pub use identity::{
    ContractId, DisputeId, MilestoneId, ProjectId, ProposalId, SubmissionId, TeamId, UserId,
};
pub use money::{Amount, BudgetRange, FeeRate, BPS_DENOMINATOR};
pub use temporal::Timestamp;
