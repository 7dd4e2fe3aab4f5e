//! Money type
//!
//! Domain primitive for prices, rental totals and fees.
//! Values are validated at construction time, so a `Money` held anywhere
//! in the ledger is always a settleable amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest amount a single price or settlement may carry (1 trillion units)
const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Maximum decimal places (cents)
const MAX_SCALE: u32 = 2;

/// Money represents a validated, non-negative monetary value.
///
/// # Invariants
/// - Value is zero or positive
/// - At most 2 decimal places
/// - At most 1 trillion units
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use marketplace_ledger::domain::Money;
///
/// let price = Money::new(Decimal::new(50_000, 0)).unwrap();
/// assert_eq!(price.times_days(3).unwrap().value(), Decimal::new(150_000, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

/// Errors that can occur when creating or combining Money
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Create a new Money value with validation.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::Negative(value));
        }

        // Trailing zeros (e.g. NUMERIC(14,4) columns) don't count towards the scale
        let value = value.normalize();
        if value.scale() > MAX_SCALE {
            return Err(MoneyError::TooManyDecimals(value.scale()));
        }

        if value > Decimal::from(MAX_AMOUNT) {
            return Err(MoneyError::Overflow);
        }

        Ok(Self(value))
    }

    /// Create Money from whole currency units.
    pub fn from_units(units: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::from(units))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply a per-day rate by a number of days.
    pub fn times_days(&self, days: i64) -> Result<Money, MoneyError> {
        if days < 0 {
            return Err(MoneyError::Negative(Decimal::from(days)));
        }
        let total = self
            .0
            .checked_mul(Decimal::from(days))
            .ok_or(MoneyError::Overflow)?;
        Money::new(total)
    }

    /// Add two amounts, failing on overflow.
    pub fn try_add(&self, other: &Money) -> Result<Money, MoneyError> {
        let sum = self.0.checked_add(other.0).ok_or(MoneyError::Overflow)?;
        Money::new(sum)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Money::new(decimal)
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Money::from_str(&value)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.to_string()
    }
}
