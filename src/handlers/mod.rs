//! Command Handlers module
//!
//! The inventory ledger's operations. Each handler runs one storage
//! transaction: lock the affected row, check the business rules against the
//! locked state, write, commit, and only then enqueue notifications.

mod commands;
mod complete_rental_handler;
mod purchase_handler;
mod rent_handler;


use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{AuthContext, LateFeePolicy, Money, RentalRecord, SaleRecord};
use crate::error::{AppError, AppResult};
use crate::ledger::{LedgerStore, LedgerStoreError};
use crate::notifications::NotificationQueue;

pub use commands::*;
pub use complete_rental_handler::CompleteRentalHandler;
pub use purchase_handler::PurchaseHandler;
pub use rent_handler::RentHandler;

/// Log a storage failure with the operation and record involved.
/// The open transaction is rolled back when the caller returns.
fn storage_failure(operation: &'static str, id: Uuid, e: LedgerStoreError) -> AppError {
    error!(operation, %id, error = %e, "Ledger storage failure, rolling back");
    AppError::Storage(e)
}

/// Ledger-wide settings
#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    /// Penalty per late day stamped on every new rental
    pub penalty_per_day: Money,
    pub late_fees: LateFeePolicy,
}

/// Entry point bundling the three ledger operations over one store
pub struct InventoryLedger<S: LedgerStore> {
    purchase: PurchaseHandler<S>,
    rent: RentHandler<S>,
    complete: CompleteRentalHandler<S>,
}

impl<S: LedgerStore> InventoryLedger<S> {
    pub fn new(
        store: S,
        notifications: NotificationQueue,
        clock: Arc<dyn Clock>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            purchase: PurchaseHandler::new(store.clone(), notifications.clone(), clock.clone()),
            rent: RentHandler::new(
                store.clone(),
                notifications.clone(),
                clock.clone(),
                settings.penalty_per_day,
            ),
            complete: CompleteRentalHandler::new(store, notifications, clock, settings.late_fees),
        }
    }

    pub async fn purchase(&self, context: &AuthContext, item_id: Uuid) -> AppResult<SaleRecord> {
        self.purchase
            .execute(PurchaseCommand::new(item_id), context)
            .await
    }

    pub async fn rent(
        &self,
        context: &AuthContext,
        item_id: Uuid,
        start_date: &str,
        end_date: &str,
    ) -> AppResult<RentalRecord> {
        self.rent
            .execute(RentCommand::new(item_id, start_date, end_date), context)
            .await
    }

    pub async fn complete_rental(
        &self,
        context: &AuthContext,
        rental_id: Uuid,
    ) -> AppResult<RentalSettlement> {
        self.complete
            .execute(CompleteRentalCommand::new(rental_id), context)
            .await
    }
}
