//! Inventory item and its availability state machine.
//!
//! ```text
//! Available --purchase--> Sold            (terminal)
//! Available --rent------> Rented --complete--> Available
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{DomainError, Money};

/// Availability of a listed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Available,
    Sold,
    Rented,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Sold => "sold",
            ItemStatus::Rented => "rented",
        }
    }

    /// Whether the state machine has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Available, ItemStatus::Sold)
                | (ItemStatus::Available, ItemStatus::Rented)
                | (ItemStatus::Rented, ItemStatus::Available)
        )
    }

    pub fn transition_to(&self, next: ItemStatus) -> Result<ItemStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Sold)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ItemStatus::Available),
            "sold" => Ok(ItemStatus::Sold),
            "rented" => Ok(ItemStatus::Rented),
            other => Err(format!("unknown item status '{}'", other)),
        }
    }
}

/// A listed durable good
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub sale_price: Money,
    /// `None` or zero means the item is not offered for rent
    pub rental_price_per_day: Option<Money>,
    pub status: ItemStatus,
}

impl InventoryItem {
    /// The daily rental rate, if the item is rentable at all
    pub fn daily_rate(&self) -> Option<Money> {
        self.rental_price_per_day.filter(|rate| !rate.is_zero())
    }

    /// Check that `buyer_id` may purchase this item right now.
    pub fn ensure_purchasable_by(&self, buyer_id: Uuid) -> Result<(), DomainError> {
        self.ensure_available()?;
        if self.owner_id == buyer_id {
            return Err(DomainError::SelfTrade);
        }
        Ok(())
    }

    /// Check that `renter_id` may rent this item; returns the daily rate.
    pub fn ensure_rentable_by(&self, renter_id: Uuid) -> Result<Money, DomainError> {
        let rate = self.daily_rate().ok_or(DomainError::NotRentable(self.id))?;
        self.ensure_available()?;
        if self.owner_id == renter_id {
            return Err(DomainError::SelfTrade);
        }
        Ok(rate)
    }

    fn ensure_available(&self) -> Result<(), DomainError> {
        if self.status != ItemStatus::Available {
            return Err(DomainError::ItemUnavailable {
                item_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}
