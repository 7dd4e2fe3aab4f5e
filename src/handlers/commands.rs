//! Command definitions
//!
//! Commands represent intentions to change the ledger. The acting user is
//! never part of a command; it comes from the [`AuthContext`] passed
//! alongside.
//!
//! [`AuthContext`]: crate::domain::AuthContext

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Money, RentalRecord};

/// Command to buy an item outright
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCommand {
    pub item_id: Uuid,
}

impl PurchaseCommand {
    pub fn new(item_id: Uuid) -> Self {
        Self { item_id }
    }
}

/// Command to rent an item for an inclusive date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentCommand {
    pub item_id: Uuid,
    /// First rental day, `YYYY-MM-DD`
    pub start_date: String,
    /// Last rental day, `YYYY-MM-DD`
    pub end_date: String,
}

impl RentCommand {
    pub fn new(item_id: Uuid, start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            item_id,
            start_date: start_date.into(),
            end_date: end_date.into(),
        }
    }
}

/// Command to close an active rental and hand the item back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRentalCommand {
    pub rental_id: Uuid,
}

impl CompleteRentalCommand {
    pub fn new(rental_id: Uuid) -> Self {
        Self { rental_id }
    }
}

/// Outcome of a completed rental
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RentalSettlement {
    #[serde(flatten)]
    pub rental: RentalRecord,
    /// Booked amount plus late fee
    pub settlement_amount: Money,
}
