//! # guild-escrow — Escrow Accounting and Dispute Records
//!
//! - **Escrow** (`account.rs`): one [`EscrowAccount`] per contract. Funding
//!   must match the contract total exactly, releases are keyed by milestone
//!   and idempotent, and the released amount never exceeds the total.
//! - **Dispute** (`dispute.rs`): [`Dispute`] records raised against a
//!   contract or a milestone, with arbitration outcomes.
//! - **Errors** (`error.rs`): [`EscrowError`] carrying the contract or
//!   dispute id and the amounts involved.

pub mod account;
pub mod dispute;
pub mod error;

pub use account::{
    EscrowAccount, EscrowSummary, EscrowTransaction, ReleaseOutcome, TransactionType,
};
pub use dispute::{Dispute, DisputeOutcome, DisputeTarget};
pub use error::EscrowError;
