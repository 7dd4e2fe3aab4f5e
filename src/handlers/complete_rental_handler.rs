//! Complete Rental Handler
//!
//! Closes an active rental, charges any late fee and makes the item
//! available again.

use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::domain::{AuthContext, DomainError, ItemStatus, LateFeePolicy};
use crate::error::AppResult;
use crate::ledger::{LedgerStore, LedgerStoreError, LedgerTransaction};
use crate::notifications::{Notification, NotificationQueue};

use super::{storage_failure, CompleteRentalCommand, RentalSettlement};

/// Handler for rental completion
pub struct CompleteRentalHandler<S: LedgerStore> {
    store: S,
    notifications: NotificationQueue,
    clock: Arc<dyn Clock>,
    late_fees: LateFeePolicy,
}

impl<S: LedgerStore> CompleteRentalHandler<S> {
    pub fn new(
        store: S,
        notifications: NotificationQueue,
        clock: Arc<dyn Clock>,
        late_fees: LateFeePolicy,
    ) -> Self {
        Self {
            store,
            notifications,
            clock,
            late_fees,
        }
    }

    /// Execute the completion command
    pub async fn execute(
        &self,
        command: CompleteRentalCommand,
        context: &AuthContext,
    ) -> AppResult<RentalSettlement> {
        let actor_id = context.current_user_id()?;
        let rental_id = command.rental_id;
        let fail = |e| storage_failure("complete_rental", rental_id, e);

        let mut tx = self.store.begin().await.map_err(fail)?;

        let rental = tx
            .lock_rental(rental_id)
            .await
            .map_err(fail)?
            .ok_or(DomainError::RentalNotFound(rental_id))?;

        if !rental.is_party(actor_id) {
            return Err(DomainError::NotRentalParty {
                rental_id,
                actor_id,
            }
            .into());
        }

        let now = self.clock.now();
        let late_fee = self
            .late_fees
            .late_fee(rental.end_date, rental.penalty_per_day, self.clock.today())
            .map_err(DomainError::from)?;
        let completed = rental.complete(late_fee, now)?;
        let settlement_amount = completed
            .settlement_amount()
            .map_err(DomainError::from)?;

        let item_id = completed.item_id;
        let item = tx.lock_item(item_id).await.map_err(fail)?.ok_or_else(|| {
            fail(LedgerStoreError::CorruptRow {
                table: "rentals",
                id: rental_id,
                reason: format!("rented item {} does not exist", item_id),
            })
        })?;
        let next = item.status.transition_to(ItemStatus::Available)?;

        tx.update_rental(&completed).await.map_err(fail)?;
        tx.update_item_status(item_id, next).await.map_err(fail)?;
        tx.commit().await.map_err(fail)?;

        info!(
            %rental_id,
            %item_id,
            %actor_id,
            late_fee = %completed.late_fee,
            settlement_amount = %settlement_amount,
            correlation_id = ?context.correlation_id,
            "Rental completed"
        );

        self.notifications.enqueue_all(Notification::for_completion(
            &completed,
            settlement_amount,
            now,
        ));

        Ok(RentalSettlement {
            rental: completed,
            settlement_amount,
        })
    }
}
