//! Rental period arithmetic and late-fee policy.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{DomainError, Money, MoneyError};

/// Wire format for rental dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive date range of a rental. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl RentalPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if end < start {
            return Err(DomainError::InvalidPeriod(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse ISO dates and check the period does not begin before `today`.
    pub fn parse(start: &str, end: &str, today: NaiveDate) -> Result<Self, DomainError> {
        let start = parse_date("start_date", start)?;
        let end = parse_date("end_date", end)?;
        let period = Self::new(start, end)?;

        if period.start < today {
            return Err(DomainError::InvalidPeriod(format!(
                "start date {} is in the past (today is {})",
                period.start, today
            )));
        }
        Ok(period)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Inclusive day count: 2024-01-01..=2024-01-03 is 3 days
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn total(&self, daily_rate: Money) -> Result<Money, MoneyError> {
        daily_rate.times_days(self.days())
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        DomainError::InvalidPeriod(format!(
            "{} '{}' is not a valid YYYY-MM-DD date",
            field, value
        ))
    })
}

/// Late fee charged when a rental is completed after its end date.
///
/// Days strictly after `end_date` count as late, minus `grace_days`.
/// The fee is `late_days * penalty_per_day`, rounded half away from zero
/// to whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateFeePolicy {
    pub grace_days: u32,
}

impl LateFeePolicy {
    pub fn new(grace_days: u32) -> Self {
        Self { grace_days }
    }

    pub fn late_days(&self, end_date: NaiveDate, today: NaiveDate) -> i64 {
        let overdue = (today - end_date).num_days();
        (overdue - i64::from(self.grace_days)).max(0)
    }

    pub fn late_fee(
        &self,
        end_date: NaiveDate,
        penalty_per_day: Money,
        today: NaiveDate,
    ) -> Result<Money, MoneyError> {
        let fee = penalty_per_day.times_days(self.late_days(end_date, today))?;
        let rounded: Decimal = fee
            .value()
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Money::new(rounded)
    }
}

impl Default for LateFeePolicy {
    fn default() -> Self {
        Self::new(0)
    }
}
