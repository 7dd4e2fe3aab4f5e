//! Notifications module
//!
//! Best-effort delivery of ledger events to users. The ledger only ever
//! enqueues after its transaction has committed; delivery runs on a
//! background worker and its outcome never reaches the ledger's caller.

mod queue;
mod sink;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{InventoryItem, Money, RentalRecord};

pub use queue::{
    DispatchOutcome, DispatchSnapshot, DispatchStats, NotificationQueue, NotificationWorker,
};
pub use sink::{NotificationSink, PgNotificationSink};

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Buyer side of a sale
    Purchase,
    /// Seller side of a sale
    Sale,
    /// Renter side of a new rental
    RentalBooked,
    /// Owner side of a new rental
    RentalReceived,
    /// Either party of a completed rental
    RentalCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Purchase => "purchase",
            NotificationKind::Sale => "sale",
            NotificationKind::RentalBooked => "rental_booked",
            NotificationKind::RentalReceived => "rental_received",
            NotificationKind::RentalCompleted => "rental_completed",
        }
    }
}

/// A message addressed to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            message: message.into(),
            created_at: now,
        }
    }

    /// Buyer and seller confirmations for a completed purchase
    pub fn for_purchase(
        item: &InventoryItem,
        buyer_id: Uuid,
        amount: Money,
        now: DateTime<Utc>,
    ) -> [Notification; 2] {
        let date = display_date(now.date_naive());
        [
            Notification::new(
                buyer_id,
                NotificationKind::Purchase,
                format!("You purchased {} on {} for {}", item.title, date, amount),
                now,
            ),
            Notification::new(
                item.owner_id,
                NotificationKind::Sale,
                format!("You sold {} on {} for {}", item.title, date, amount),
                now,
            ),
        ]
    }

    /// Renter and owner confirmations for a new rental
    pub fn for_rental(
        item: &InventoryItem,
        rental: &RentalRecord,
        now: DateTime<Utc>,
    ) -> [Notification; 2] {
        let period = format!(
            "{} to {}",
            display_date(rental.start_date),
            display_date(rental.end_date)
        );
        [
            Notification::new(
                rental.renter_id,
                NotificationKind::RentalBooked,
                format!(
                    "You rented {} from {} for {}",
                    item.title, period, rental.amount
                ),
                now,
            ),
            Notification::new(
                rental.owner_id,
                NotificationKind::RentalReceived,
                format!(
                    "{} was rented out from {} for {}",
                    item.title, period, rental.amount
                ),
                now,
            ),
        ]
    }

    /// Completion notices for both parties
    pub fn for_completion(
        rental: &RentalRecord,
        settlement: Money,
        now: DateTime<Utc>,
    ) -> [Notification; 2] {
        let message = if rental.late_fee.is_zero() {
            format!("Rental {} completed, total {}", rental.id, settlement)
        } else {
            format!(
                "Rental {} completed, total {} including late fee {}",
                rental.id, settlement, rental.late_fee
            )
        };
        [
            Notification::new(
                rental.renter_id,
                NotificationKind::RentalCompleted,
                message.clone(),
                now,
            ),
            Notification::new(
                rental.owner_id,
                NotificationKind::RentalCompleted,
                message,
                now,
            ),
        ]
    }
}

fn display_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

/// Notification delivery errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}
