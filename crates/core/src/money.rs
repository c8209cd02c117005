//! Exact monetary amounts.
//!
//! All journal-entry amounts are non-negative exact decimals; binary floating
//! point is never used for money. Signed arithmetic (balance deltas) works on
//! plain `Decimal` values.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
}

/// A non-negative exact decimal amount (SEK).
///
/// # Invariant
/// The inner value is always >= 0; enforced by the constructor and by
/// `checked_sub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new amount; negative values are rejected.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            Err(AmountError::Negative(value))
        } else {
            Ok(Self(value))
        }
    }

    /// Create an amount without validation.
    ///
    /// The caller must ensure the value is non-negative. Use only for trusted
    /// sources (constants, validated storage).
    #[inline]
    pub const fn new_unchecked(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Subtraction that refuses to go negative.
    pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
        let result = self.0.checked_sub(other.0)?;
        if result < Decimal::ZERO {
            None
        } else {
            Some(Amount(result))
        }
    }

    /// Round to the nearest whole currency unit, half away from zero
    /// (Skatteverket whole-krona rule).
    pub fn round_whole(&self) -> Amount {
        Amount(
            self.0
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Whether the amount is a whole number of currency units.
    pub fn is_whole(&self) -> bool {
        self.0 == self.0.trunc()
    }

    /// Absolute difference between two amounts.
    pub fn abs_diff(&self, other: Amount) -> Amount {
        Amount((self.0 - other.0).abs())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}
