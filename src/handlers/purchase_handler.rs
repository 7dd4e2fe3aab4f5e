//! Purchase Handler
//!
//! Sells an available item to the acting user.

use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::domain::{AuthContext, DomainError, ItemStatus, SaleRecord};
use crate::error::AppResult;
use crate::ledger::{LedgerStore, LedgerTransaction};
use crate::notifications::{Notification, NotificationQueue};

use super::{storage_failure, PurchaseCommand};

/// Handler for purchases
pub struct PurchaseHandler<S: LedgerStore> {
    store: S,
    notifications: NotificationQueue,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> PurchaseHandler<S> {
    pub fn new(store: S, notifications: NotificationQueue, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifications,
            clock,
        }
    }

    /// Execute the purchase command
    pub async fn execute(
        &self,
        command: PurchaseCommand,
        context: &AuthContext,
    ) -> AppResult<SaleRecord> {
        let buyer_id = context.current_user_id()?;
        let item_id = command.item_id;
        let fail = |e| storage_failure("purchase", item_id, e);

        let mut tx = self.store.begin().await.map_err(fail)?;

        // Lock first; every check below sees the committed state
        let item = tx
            .lock_item(item_id)
            .await
            .map_err(fail)?
            .ok_or(DomainError::ItemNotFound(item_id))?;

        item.ensure_purchasable_by(buyer_id)?;
        let next = item.status.transition_to(ItemStatus::Sold)?;

        let now = self.clock.now();
        let sale = SaleRecord::settle(&item, buyer_id, now);

        tx.update_item_status(item_id, next).await.map_err(fail)?;
        tx.insert_sale(&sale).await.map_err(fail)?;
        tx.commit().await.map_err(fail)?;

        info!(
            sale_id = %sale.id,
            %item_id,
            %buyer_id,
            seller_id = %sale.seller_id,
            amount = %sale.amount,
            correlation_id = ?context.correlation_id,
            "Item sold"
        );

        self.notifications
            .enqueue_all(Notification::for_purchase(&item, buyer_id, sale.amount, now));

        Ok(sale)
    }
}
