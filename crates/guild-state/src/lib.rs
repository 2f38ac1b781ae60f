//! # guild-state — Closed Status Machines
//!
//! Every status field in the engine is a closed enum with an explicit
//! transition table. Transitions go through [`Lifecycle::transition_to`] (or
//! [`MilestoneStatus::apply`] for trigger-driven milestone moves) and either
//! return the next state or a [`TransitionError`]. There is no raw string
//! mutation anywhere.
//!
//! ## State Machines
//!
//! - **Project** (`project.rs`): `Open → Negotiating → InProgress → Completed`
//!   with `Matched` and `Cancelled` branches.
//! - **Proposal** (`proposal.rs`): `Pending → Accepted | Rejected | Withdrawn`.
//! - **Contract** (`contract.rs`): `Draft → Active → Completed | Terminated`.
//! - **Milestone** (`milestone.rs`): work/review/dispute cycle, driven by
//!   [`MilestoneTrigger`].
//! - **Escrow** (`escrow.rs`): `NotFunded → Funded ⇄ OnHold → Released | Refunded`.
//! - **Dispute** (`dispute.rs`): `Open → UnderReview → Resolved`.
//!
//! [`StateTrail`] pairs a current status with its ordered transition log.

pub mod contract;
pub mod dispute;
pub mod error;
pub mod escrow;
pub mod lifecycle;
pub mod milestone;
pub mod project;
pub mod proposal;

// ─── Lifecycle re-exports ───────────────────────────────────────────

pub use error::TransitionError;
pub use lifecycle::{Lifecycle, StateTrail, TransitionRecord};

// ─── Status re-exports ──────────────────────────────────────────────

pub use contract::ContractStatus;
pub use dispute::DisputeStatus;
pub use escrow::EscrowStatus;
pub use milestone::{MilestoneResolution, MilestoneStatus, MilestoneTrigger};
pub use project::ProjectStatus;
pub use proposal::ProposalStatus;
