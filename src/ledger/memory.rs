//! In-memory ledger store (for development/testing)
//!
//! Mirrors the locking discipline of the PostgreSQL store: each row has an
//! async mutex that a transaction holds from `lock_*` until commit or drop.
//! Writes are staged and applied in one step on commit, before the row
//! locks are released, so the next lock holder always reads committed state.
//! A row's lock entry is forgotten once no transaction holds or awaits it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{InventoryItem, ItemStatus, RentalRecord, SaleRecord};

use super::{LedgerStore, LedgerStoreError, LedgerTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Item(Uuid),
    Rental(Uuid),
}

#[derive(Debug, Default)]
struct Tables {
    items: HashMap<Uuid, InventoryItem>,
    sales: Vec<SaleRecord>,
    rentals: HashMap<Uuid, RentalRecord>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: StdMutex<HashMap<RowKey, Arc<Mutex<()>>>>,
}

/// Thread-safe in-memory ledger store
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an item (listing CRUD lives outside the ledger)
    pub async fn insert_item(&self, item: InventoryItem) {
        self.shared.tables.lock().await.items.insert(item.id, item);
    }

    /// Seed a rental record directly, e.g. one that started in the past
    pub async fn insert_rental(&self, rental: RentalRecord) {
        self.shared
            .tables
            .lock()
            .await
            .rentals
            .insert(rental.id, rental);
    }

    fn row_locks(&self) -> std::sync::MutexGuard<'_, HashMap<RowKey, Arc<Mutex<()>>>> {
        self.shared
            .row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, key: RowKey) -> Arc<Mutex<()>> {
        self.row_locks().entry(key).or_default().clone()
    }

    /// Forget lock entries that nobody holds or waits on
    fn prune_row_locks(&self, keys: impl IntoIterator<Item = RowKey>) {
        let mut locks = self.row_locks();
        for key in keys {
            // Holders and waiters each keep a clone, so a count of 1 means idle
            if locks.get(&key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(&key);
            }
        }
    }
}

enum StagedWrite {
    ItemStatus(Uuid, ItemStatus),
    Sale(SaleRecord),
    Rental(RentalRecord),
}

/// An open in-memory transaction
pub struct MemoryLedgerTx {
    store: MemoryLedgerStore,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    staged: Vec<StagedWrite>,
}

impl MemoryLedgerTx {
    async fn acquire(&mut self, key: RowKey) {
        if self.held.contains_key(&key) {
            return;
        }
        let lock = self.store.row_lock(key);
        let guard = lock.lock_owned().await;
        self.held.insert(key, guard);
    }

    fn ensure_held(&self, key: RowKey) -> Result<(), LedgerStoreError> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        let (table, id) = match key {
            RowKey::Item(id) => ("items", id),
            RowKey::Rental(id) => ("rentals", id),
        };
        Err(LedgerStoreError::LockNotHeld { table, id })
    }
}

impl Drop for MemoryLedgerTx {
    fn drop(&mut self) {
        let keys: Vec<RowKey> = self.held.keys().copied().collect();
        self.held.clear();
        self.store.prune_row_locks(keys);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> Result<MemoryLedgerTx, LedgerStoreError> {
        Ok(MemoryLedgerTx {
            store: self.clone(),
            held: HashMap::new(),
            staged: Vec::new(),
        })
    }

    async fn find_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, LedgerStoreError> {
        Ok(self.shared.tables.lock().await.items.get(&item_id).cloned())
    }

    async fn find_rental(
        &self,
        rental_id: Uuid,
    ) -> Result<Option<RentalRecord>, LedgerStoreError> {
        Ok(self
            .shared
            .tables
            .lock()
            .await
            .rentals
            .get(&rental_id)
            .cloned())
    }

    async fn sales_for_item(&self, item_id: Uuid) -> Result<Vec<SaleRecord>, LedgerStoreError> {
        let tables = self.shared.tables.lock().await;
        Ok(tables
            .sales
            .iter()
            .filter(|sale| sale.item_id == item_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTx {
    async fn lock_item(
        &mut self,
        item_id: Uuid,
    ) -> Result<Option<InventoryItem>, LedgerStoreError> {
        self.acquire(RowKey::Item(item_id)).await;
        self.store.find_item(item_id).await
    }

    async fn update_item_status(
        &mut self,
        item_id: Uuid,
        status: ItemStatus,
    ) -> Result<(), LedgerStoreError> {
        self.ensure_held(RowKey::Item(item_id))?;
        self.staged.push(StagedWrite::ItemStatus(item_id, status));
        Ok(())
    }

    async fn insert_sale(&mut self, sale: &SaleRecord) -> Result<(), LedgerStoreError> {
        self.staged.push(StagedWrite::Sale(sale.clone()));
        Ok(())
    }

    async fn insert_rental(&mut self, rental: &RentalRecord) -> Result<(), LedgerStoreError> {
        self.staged.push(StagedWrite::Rental(rental.clone()));
        Ok(())
    }

    async fn lock_rental(
        &mut self,
        rental_id: Uuid,
    ) -> Result<Option<RentalRecord>, LedgerStoreError> {
        self.acquire(RowKey::Rental(rental_id)).await;
        self.store.find_rental(rental_id).await
    }

    async fn update_rental(&mut self, rental: &RentalRecord) -> Result<(), LedgerStoreError> {
        self.ensure_held(RowKey::Rental(rental.id))?;
        self.staged.push(StagedWrite::Rental(rental.clone()));
        Ok(())
    }

    async fn commit(mut self) -> Result<(), LedgerStoreError> {
        let staged = std::mem::take(&mut self.staged);

        {
            let mut tables = self.store.shared.tables.lock().await;

            // Validate before applying anything so a failed commit leaves no trace
            for write in &staged {
                if let StagedWrite::ItemStatus(item_id, _) = write {
                    if !tables.items.contains_key(item_id) {
                        return Err(LedgerStoreError::CorruptRow {
                            table: "items",
                            id: *item_id,
                            reason: "row disappeared while locked".to_string(),
                        });
                    }
                }
            }

            for write in staged {
                match write {
                    StagedWrite::ItemStatus(item_id, status) => {
                        if let Some(item) = tables.items.get_mut(&item_id) {
                            item.status = status;
                        }
                    }
                    StagedWrite::Sale(sale) => tables.sales.push(sale),
                    StagedWrite::Rental(rental) => {
                        tables.rentals.insert(rental.id, rental);
                    }
                }
            }
        }

        // Row locks are released on drop, after the writes are visible
        Ok(())
    }
}
