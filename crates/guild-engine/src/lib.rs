#![deny(missing_docs)]

//! # guild-engine — Marketplace Engagement Engine
//!
//! Takes a client's project from competing proposals to a paid-out (or
//! refunded) contract. [`Engine`] is the single entry point; its commands
//! are grouped by component:
//!
//! | Component              | Commands                                              |
//! |------------------------|-------------------------------------------------------|
//! | ProposalRegistry       | `submit_proposal`, `withdraw_proposal`, ranking       |
//! | AcceptanceOrchestrator | `accept_proposal`, `accept_proposal_with_plan`        |
//! | MilestoneLedger        | `add_milestone`, `start_milestone`                    |
//! | SubmissionTracker      | `submit_milestone`, `review_milestone`                |
//! | EscrowAccount          | `fund_escrow`, `hold_escrow`, `release_hold`, `refund_escrow` |
//! | DisputeHandler         | `file_dispute`, `begin_dispute_review`, `resolve_dispute` |
//!
//! ## Concurrency
//!
//! Callers are stateless and may invoke commands from any thread. Commands
//! serialize on a per-project, per-contract or per-milestone lock
//! ([`locks::KeyedLocks`]) with a bounded wait; a timeout surfaces as
//! [`EngineError::Conflict`] and the command can be retried unchanged. Each
//! command stages its changes and commits them in one write section, so a
//! failed command changes nothing.
//!
//! ## Events
//!
//! Committed changes are published to an [`EventSink`] as [`EngineEvent`]s
//! inside the same write section that applies them, so readers and the
//! sink agree on what has happened and in which order.

pub mod acceptance;
pub mod config;
pub mod directory;
mod disputes;
pub mod engine;
pub mod error;
mod escrow;
pub mod events;
pub mod locks;
mod milestones;
mod projects;
pub mod proposals;
pub mod records;
pub mod snapshot;
mod store;
mod submissions;

pub use acceptance::ContractFactory;
pub use config::{EngineConfig, GuildConfig};
pub use directory::{InMemoryTeamDirectory, TeamDirectory, TeamProfile};
pub use engine::Engine;
pub use error::EngineError;
pub use events::{EngineEvent, EventFeed, EventSink, FanoutSink, FeedEntry, TracingSink};
pub use proposals::{rank_proposals, ProposalSort};
pub use records::{Contract, Milestone, MilestoneDraft, Project, Proposal, Review, Submission};
pub use snapshot::EngineSnapshot;

// Escrow and dispute record types appear in command signatures.
pub use guild_escrow::{
    Dispute, DisputeOutcome, DisputeTarget, EscrowSummary, EscrowTransaction, TransactionType,
};
