//! Sale and rental records written by the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{DomainError, InventoryItem, Money, MoneyError, RentalPeriod};

/// Sale status. Purchases settle instantly, so there is one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
        }
    }
}

impl FromStr for SaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(SaleStatus::Completed),
            other => Err(format!("unknown sale status '{}'", other)),
        }
    }
}

/// Immutable record of a completed purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: Uuid,
    pub item_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub amount: Money,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

impl SaleRecord {
    /// Settle a purchase of `item` at its listed price
    pub fn settle(item: &InventoryItem, buyer_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id: item.id,
            seller_id: item.owner_id,
            buyer_id,
            amount: item.sale_price,
            status: SaleStatus::Completed,
            created_at: now,
        }
    }
}

/// Rental status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Active,
    Completed,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Active => "active",
            RentalStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RentalStatus::Active),
            "completed" => Ok(RentalStatus::Completed),
            other => Err(format!("unknown rental status '{}'", other)),
        }
    }
}

/// A rental of one item over an inclusive date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalRecord {
    pub id: Uuid,
    pub item_id: Uuid,
    pub owner_id: Uuid,
    pub renter_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Rental total for the booked period
    pub amount: Money,
    pub penalty_per_day: Money,
    /// Late fee charged on completion
    pub late_fee: Money,
    pub status: RentalStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RentalRecord {
    /// Open an active rental of `item` for `period`
    pub fn open(
        item: &InventoryItem,
        renter_id: Uuid,
        period: RentalPeriod,
        daily_rate: Money,
        penalty_per_day: Money,
        now: DateTime<Utc>,
    ) -> Result<Self, MoneyError> {
        Ok(Self {
            id: Uuid::new_v4(),
            item_id: item.id,
            owner_id: item.owner_id,
            renter_id,
            start_date: period.start(),
            end_date: period.end(),
            amount: period.total(daily_rate)?,
            penalty_per_day,
            late_fee: Money::ZERO,
            status: RentalStatus::Active,
            created_at: now,
            completed_at: None,
        })
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id || self.renter_id == user_id
    }

    /// Amount owed in total: booked period plus late fee
    pub fn settlement_amount(&self) -> Result<Money, MoneyError> {
        self.amount.try_add(&self.late_fee)
    }

    /// Settle the rental with the given late fee
    pub fn complete(
        mut self,
        late_fee: Money,
        now: DateTime<Utc>,
    ) -> Result<RentalRecord, DomainError> {
        if self.status != RentalStatus::Active {
            return Err(DomainError::RentalNotActive {
                rental_id: self.id,
                status: self.status,
            });
        }
        self.late_fee = late_fee;
        self.status = RentalStatus::Completed;
        self.completed_at = Some(now);
        Ok(self)
    }
}
