//! # Escrow Account
//!
//! Tracks the funding and payout state of a single contract. The account
//! never moves money; it records what the settlement collaborator must do
//! and refuses anything that would break the monetary invariants:
//!
//! - the deposit equals the contract total,
//! - each milestone is released at most once,
//! - `0 <= released <= total` after every operation, and `released` never
//!   decreases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use guild_core::{Amount, ContractId, FeeRate, MilestoneId, Timestamp};
use guild_state::{EscrowStatus, StateTrail, TransitionRecord};

use crate::error::EscrowError;

// ── Transactions ───────────────────────────────────────────────────────

/// Kinds of escrow ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Client deposit.
    Deposit,
    /// Payout for one approved milestone.
    MilestoneRelease,
    /// Escrow frozen.
    Hold,
    /// Freeze lifted.
    HoldRelease,
    /// Remaining balance returned to the client.
    Refund,
}

/// A recorded escrow ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowTransaction {
    /// Entry kind.
    pub transaction_type: TransactionType,
    /// Amount moved (zero for holds).
    pub amount: Amount,
    /// Milestone the entry pays out, for releases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<MilestoneId>,
    /// When the entry was recorded.
    pub timestamp: Timestamp,
    /// Free-form reason.
    pub reason: String,
}

/// Result of a milestone release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Amount released; escrow still funded.
    Partial,
    /// Amount released and the escrow is now fully paid out.
    FullyReleased,
    /// The milestone was already paid; nothing changed.
    AlreadyReleased,
}

/// Point-in-time view of an escrow account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSummary {
    /// Contract total.
    pub total: Amount,
    /// Sum of released milestone amounts.
    pub released: Amount,
    /// `total - released`.
    pub held: Amount,
    /// Current escrow status.
    pub status: EscrowStatus,
    /// Platform fee rate.
    pub fee_rate: FeeRate,
    /// Platform fee on the released amount.
    pub platform_fee: Amount,
    /// Team payout on the released amount.
    pub team_payout: Amount,
}

// ── Escrow Account ─────────────────────────────────────────────────────

/// Escrow state of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowAccount {
    /// Owning contract.
    pub contract_id: ContractId,
    /// Contract total the deposit must match.
    pub total: Amount,
    /// Platform fee rate applied to payouts.
    pub fee_rate: FeeRate,
    trail: StateTrail<EscrowStatus>,
    released: Amount,
    releases: BTreeMap<MilestoneId, Amount>,
    transactions: Vec<EscrowTransaction>,
}

impl EscrowAccount {
    /// Open an unfunded account for a contract.
    pub fn open(contract_id: ContractId, total: Amount, fee_rate: FeeRate) -> Self {
        Self {
            contract_id,
            total,
            fee_rate,
            trail: StateTrail::new(EscrowStatus::NotFunded),
            released: Amount::ZERO,
            releases: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }

    /// Current status.
    pub fn status(&self) -> EscrowStatus {
        self.trail.status()
    }

    /// Sum released so far.
    pub fn released_amount(&self) -> Amount {
        self.released
    }

    /// Amount still held: `total - released`.
    pub fn held_amount(&self) -> Amount {
        self.total.checked_sub(self.released).unwrap_or(Amount::ZERO)
    }

    /// Whether the given milestone has been paid.
    pub fn is_released_for(&self, milestone_id: &MilestoneId) -> bool {
        self.releases.contains_key(milestone_id)
    }

    /// Ledger entries in the order recorded.
    pub fn transactions(&self) -> &[EscrowTransaction] {
        &self.transactions
    }

    /// Status transitions in the order they happened.
    pub fn history(&self) -> &[TransitionRecord<EscrowStatus>] {
        self.trail.history()
    }

    /// Summary with fee breakdown on the released amount.
    pub fn summary(&self) -> EscrowSummary {
        let (platform_fee, team_payout) = self.fee_rate.split(self.released);
        EscrowSummary {
            total: self.total,
            released: self.released,
            held: self.held_amount(),
            status: self.status(),
            fee_rate: self.fee_rate,
            platform_fee,
            team_payout,
        }
    }

    /// Fund the escrow (NotFunded → Funded).
    ///
    /// # Errors
    ///
    /// [`EscrowError::Transition`] unless not funded;
    /// [`EscrowError::AmountMismatch`] if `amount != total`.
    pub fn deposit(&mut self, amount: Amount) -> Result<(), EscrowError> {
        self.trail.require(&[EscrowStatus::NotFunded], "fund")?;
        if amount != self.total {
            return Err(EscrowError::AmountMismatch {
                contract_id: self.contract_id.to_string(),
                expected: self.total.minor_units(),
                provided: amount.minor_units(),
            });
        }
        self.trail.advance(EscrowStatus::Funded, "client deposit")?;
        self.record(TransactionType::Deposit, amount, None, "client deposit");
        Ok(())
    }

    /// Freeze releases (Funded → OnHold).
    pub fn hold(&mut self, reason: &str) -> Result<(), EscrowError> {
        self.trail.advance(EscrowStatus::OnHold, reason)?;
        self.record(TransactionType::Hold, Amount::ZERO, None, reason);
        Ok(())
    }

    /// Lift a freeze (OnHold → Funded).
    pub fn release_hold(&mut self, reason: &str) -> Result<(), EscrowError> {
        self.trail.require(&[EscrowStatus::OnHold], "release_hold")?;
        self.trail.advance(EscrowStatus::Funded, reason)?;
        self.record(TransactionType::HoldRelease, Amount::ZERO, None, reason);
        Ok(())
    }

    /// Pay out one approved milestone.
    ///
    /// Idempotent per milestone: a second call for the same milestone
    /// returns [`ReleaseOutcome::AlreadyReleased`] and changes nothing.
    /// Reaching `released == total` moves the account to `Released`.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::InsufficientFunds`] if the escrow is not funded yet.
    /// - [`EscrowError::Transition`] if on hold or terminal.
    /// - [`EscrowError::InvalidAmount`] for a zero amount.
    /// - [`EscrowError::ReleaseBoundExceeded`] if `released + amount > total`.
    pub fn release_for_milestone(
        &mut self,
        milestone_id: MilestoneId,
        amount: Amount,
    ) -> Result<ReleaseOutcome, EscrowError> {
        if self.status() == EscrowStatus::NotFunded {
            return Err(EscrowError::InsufficientFunds {
                contract_id: self.contract_id.to_string(),
                requested: amount.minor_units(),
                held: 0,
            });
        }
        if self.is_released_for(&milestone_id) {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }
        self.trail.require(&[EscrowStatus::Funded], "release")?;
        if amount.is_zero() {
            return Err(EscrowError::InvalidAmount(format!(
                "release for milestone {milestone_id} must be positive"
            )));
        }
        let next = match self.released.checked_add(amount) {
            Some(next) if next <= self.total => next,
            _ => {
                return Err(EscrowError::ReleaseBoundExceeded {
                    contract_id: self.contract_id.to_string(),
                    requested: amount.minor_units(),
                    released: self.released.minor_units(),
                    total: self.total.minor_units(),
                })
            }
        };

        let fully_released = next == self.total;
        if fully_released {
            self.trail
                .advance(EscrowStatus::Released, "all milestone amounts released")?;
        }
        self.released = next;
        self.releases.insert(milestone_id, amount);
        self.record(
            TransactionType::MilestoneRelease,
            amount,
            Some(milestone_id),
            "milestone approved",
        );

        Ok(if fully_released {
            ReleaseOutcome::FullyReleased
        } else {
            ReleaseOutcome::Partial
        })
    }

    /// Return the held balance to the client (Funded | OnHold → Refunded).
    ///
    /// Returns the refunded amount. Released payouts are not clawed back.
    pub fn refund(&mut self, reason: &str) -> Result<Amount, EscrowError> {
        self.trail
            .require(&[EscrowStatus::Funded, EscrowStatus::OnHold], "refund")?;
        let refunded = self.held_amount();
        self.trail.advance(EscrowStatus::Refunded, reason)?;
        self.record(TransactionType::Refund, refunded, None, reason);
        Ok(refunded)
    }

    /// Check the monetary invariants. Used by tests and on restore.
    pub fn check_invariants(&self) -> Result<(), EscrowError> {
        let sum = Amount::try_sum(self.releases.values().copied())?;
        if sum != self.released || self.released > self.total {
            return Err(EscrowError::ReleaseBoundExceeded {
                contract_id: self.contract_id.to_string(),
                requested: 0,
                released: self.released.minor_units(),
                total: self.total.minor_units(),
            });
        }
        if self.status() == EscrowStatus::Released && self.released != self.total {
            return Err(EscrowError::InvalidAmount(format!(
                "escrow {} marked released with {} of {} paid out",
                self.contract_id, self.released, self.total
            )));
        }
        Ok(())
    }

    fn record(
        &mut self,
        transaction_type: TransactionType,
        amount: Amount,
        milestone_id: Option<MilestoneId>,
        reason: &str,
    ) {
        self.transactions.push(EscrowTransaction {
            transaction_type,
            amount,
            milestone_id,
            timestamp: Timestamp::now(),
            reason: reason.to_string(),
        });
    }
}
