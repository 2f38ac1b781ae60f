//! # Escrow Status
//!
//! ```text
//! NotFunded ──▶ Funded ──▶ Released (terminal)
//!                │  ▲
//!                ▼  │
//!               OnHold
//!                │
//! Funded | OnHold ──▶ Refunded (terminal)
//! ```
//!
//! Partial releases keep the status at `Funded`; the account itself tracks
//! the released amount.

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;

/// Funding status of a contract's escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Awaiting the client's deposit.
    NotFunded,
    /// Deposit held; releases may occur.
    Funded,
    /// Frozen by the client or the platform; no releases.
    OnHold,
    /// Entire deposit paid out (terminal).
    Released,
    /// Remaining deposit returned to the client (terminal).
    Refunded,
}

impl Lifecycle for EscrowStatus {
    const MACHINE: &'static str = "escrow";

    fn as_str(&self) -> &'static str {
        match self {
            Self::NotFunded => "not_funded",
            Self::Funded => "funded",
            Self::OnHold => "on_hold",
            Self::Released => "released",
            Self::Refunded => "refunded",
        }
    }

    fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::NotFunded => &[Self::Funded],
            Self::Funded => &[Self::OnHold, Self::Released, Self::Refunded],
            Self::OnHold => &[Self::Funded, Self::Refunded],
            Self::Released | Self::Refunded => &[],
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
