//! # Money Types
//!
//! [`Amount`] holds a non-negative quantity of minor currency units as an
//! `i64`. All arithmetic is checked; overflow surfaces as an error rather
//! than wrapping. [`FeeRate`] expresses the platform fee in basis points
//! over [`BPS_DENOMINATOR`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Basis-point denominator: 10,000 bps = 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// A non-negative amount in minor currency units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Construct an amount, rejecting negative values.
    pub fn new(minor_units: i64) -> Result<Self, ValidationError> {
        if minor_units < 0 {
            return Err(ValidationError::NonPositiveAmount(minor_units));
        }
        Ok(Self(minor_units))
    }

    /// Construct a strictly positive amount.
    ///
    /// Milestone amounts, proposal budgets and escrow deposits all go
    /// through this constructor.
    pub fn positive(minor_units: i64) -> Result<Self, ValidationError> {
        if minor_units <= 0 {
            return Err(ValidationError::NonPositiveAmount(minor_units));
        }
        Ok(Self(minor_units))
    }

    /// The raw minor-unit value.
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction. Returns `None` if the result would be negative.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        match self.0.checked_sub(other.0) {
            Some(v) if v >= 0 => Some(Amount(v)),
            _ => None,
        }
    }

    /// Sum an iterator of amounts, failing on overflow.
    pub fn try_sum<I>(amounts: I) -> Result<Amount, ValidationError>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts.into_iter().try_fold(Amount::ZERO, |acc, a| {
            acc.checked_add(a).ok_or_else(|| {
                ValidationError::AmountOverflow(format!("{} + {}", acc.0, a.0))
            })
        })
    }
}

impl TryFrom<i64> for Amount {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform fee rate in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FeeRate(u32);

impl FeeRate {
    /// Construct a fee rate, rejecting values above 100%.
    pub fn from_bps(bps: u32) -> Result<Self, ValidationError> {
        if bps > BPS_DENOMINATOR {
            return Err(ValidationError::InvalidFeeRate(bps));
        }
        Ok(Self(bps))
    }

    /// The rate in basis points.
    pub fn bps(&self) -> u32 {
        self.0
    }

    /// Platform fee owed on `amount`, rounded down.
    pub fn fee_on(&self, amount: Amount) -> Amount {
        let fee = i128::from(amount.0) * i128::from(self.0) / i128::from(BPS_DENOMINATOR);
        // fee <= amount because bps <= denominator, so the cast cannot truncate.
        Amount(fee as i64)
    }

    /// Split `amount` into (platform fee, team payout).
    pub fn split(&self, amount: Amount) -> (Amount, Amount) {
        let fee = self.fee_on(amount);
        (fee, Amount(amount.0 - fee.0))
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self(1_000)
    }
}

impl TryFrom<u32> for FeeRate {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_bps(value)
    }
}

impl From<FeeRate> for u32 {
    fn from(rate: FeeRate) -> Self {
        rate.0
    }
}

impl std::fmt::Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

/// A client's advertised budget range for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    /// Lower bound.
    pub min: Amount,
    /// Upper bound.
    pub max: Amount,
}

impl BudgetRange {
    /// Construct a range with `0 < min <= max`.
    pub fn new(min: i64, max: i64) -> Result<Self, ValidationError> {
        let min_amount = Amount::positive(min)?;
        let max_amount = Amount::positive(max)?;
        if min_amount > max_amount {
            return Err(ValidationError::InvalidBudgetRange { min, max });
        }
        Ok(Self {
            min: min_amount,
            max: max_amount,
        })
    }

    /// Whether `amount` falls within the range, inclusive.
    pub fn contains(&self, amount: Amount) -> bool {
        self.min <= amount && amount <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn negative_amount_rejected() {
        assert_eq!(
            Amount::new(-1),
            Err(ValidationError::NonPositiveAmount(-1))
        );
    }

    #[test]
    fn zero_is_not_positive() {
        assert!(Amount::new(0).is_ok());
        assert!(Amount::positive(0).is_err());
    }

    #[test]
    fn checked_sub_never_goes_negative() {
        let a = Amount::positive(5).unwrap();
        let b = Amount::positive(7).unwrap();
        assert_eq!(a.checked_sub(b), None);
        assert_eq!(b.checked_sub(a), Some(Amount::positive(2).unwrap()));
    }

    #[test]
    fn try_sum_detects_overflow() {
        let big = Amount::new(i64::MAX).unwrap();
        let one = Amount::positive(1).unwrap();
        assert!(Amount::try_sum([big, one]).is_err());
    }

    #[test]
    fn deserialize_rejects_negative() {
        let parsed: Result<Amount, _> = serde_json::from_str("-10");
        assert!(parsed.is_err());
        let ok: Amount = serde_json::from_str("4500000").unwrap();
        assert_eq!(ok.minor_units(), 4_500_000);
    }

    #[test]
    fn fee_rate_above_denominator_rejected() {
        assert!(FeeRate::from_bps(10_001).is_err());
        assert!(FeeRate::from_bps(10_000).is_ok());
    }

    #[test]
    fn fee_split_ten_percent() {
        let rate = FeeRate::from_bps(1_000).unwrap();
        let (fee, payout) = rate.split(Amount::positive(1_000_000).unwrap());
        assert_eq!(fee.minor_units(), 100_000);
        assert_eq!(payout.minor_units(), 900_000);
    }

    #[test]
    fn fee_rounds_down() {
        let rate = FeeRate::from_bps(333).unwrap();
        assert_eq!(rate.fee_on(Amount::positive(10).unwrap()).minor_units(), 0);
        assert_eq!(rate.fee_on(Amount::positive(100).unwrap()).minor_units(), 3);
    }

    #[test]
    fn budget_range_validation() {
        assert!(BudgetRange::new(100, 50).is_err());
        let range = BudgetRange::new(50, 100).unwrap();
        assert!(range.contains(Amount::positive(75).unwrap()));
        assert!(!range.contains(Amount::positive(101).unwrap()));
    }

    proptest! {
        #[test]
        fn split_preserves_total(amount in 0i64..i64::MAX, bps in 0u32..=10_000) {
            let rate = FeeRate::from_bps(bps).unwrap();
            let total = Amount::new(amount).unwrap();
            let (fee, payout) = rate.split(total);
            prop_assert_eq!(fee.minor_units() + payout.minor_units(), amount);
            prop_assert!(fee <= total);
        }
    }
}
