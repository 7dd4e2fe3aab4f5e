//! Rent Handler
//!
//! Books an available, rentable item for an inclusive date range.

use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::domain::{AuthContext, DomainError, ItemStatus, Money, RentalPeriod, RentalRecord};
use crate::error::AppResult;
use crate::ledger::{LedgerStore, LedgerTransaction};
use crate::notifications::{Notification, NotificationQueue};

use super::{storage_failure, RentCommand};

/// Handler for new rentals
pub struct RentHandler<S: LedgerStore> {
    store: S,
    notifications: NotificationQueue,
    clock: Arc<dyn Clock>,
    penalty_per_day: Money,
}

impl<S: LedgerStore> RentHandler<S> {
    pub fn new(
        store: S,
        notifications: NotificationQueue,
        clock: Arc<dyn Clock>,
        penalty_per_day: Money,
    ) -> Self {
        Self {
            store,
            notifications,
            clock,
            penalty_per_day,
        }
    }

    /// Execute the rent command
    pub async fn execute(
        &self,
        command: RentCommand,
        context: &AuthContext,
    ) -> AppResult<RentalRecord> {
        let renter_id = context.current_user_id()?;
        let item_id = command.item_id;

        // Dates are validated before any lock is taken
        let period =
            RentalPeriod::parse(&command.start_date, &command.end_date, self.clock.today())?;

        let fail = |e| storage_failure("rent", item_id, e);
        let mut tx = self.store.begin().await.map_err(fail)?;

        let item = tx
            .lock_item(item_id)
            .await
            .map_err(fail)?
            .ok_or(DomainError::ItemNotFound(item_id))?;

        let daily_rate = item.ensure_rentable_by(renter_id)?;
        let next = item.status.transition_to(ItemStatus::Rented)?;

        let now = self.clock.now();
        let rental = RentalRecord::open(
            &item,
            renter_id,
            period,
            daily_rate,
            self.penalty_per_day,
            now,
        )
        .map_err(DomainError::from)?;

        tx.update_item_status(item_id, next).await.map_err(fail)?;
        tx.insert_rental(&rental).await.map_err(fail)?;
        tx.commit().await.map_err(fail)?;

        info!(
            rental_id = %rental.id,
            %item_id,
            %renter_id,
            owner_id = %rental.owner_id,
            start_date = %rental.start_date,
            end_date = %rental.end_date,
            days = period.days(),
            amount = %rental.amount,
            correlation_id = ?context.correlation_id,
            "Item rented"
        );

        self.notifications
            .enqueue_all(Notification::for_rental(&item, &rental, now));

        Ok(rental)
    }
}
