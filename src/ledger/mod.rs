//! Ledger storage
//!
//! Transactional access to items, sales and rentals. Every mutation happens
//! inside a [`LedgerTransaction`] that holds an exclusive lock on each row it
//! has locked until `commit` (or until it is dropped, which rolls back).

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{InventoryItem, ItemStatus, RentalRecord, SaleRecord};

pub use memory::{MemoryLedgerStore, MemoryLedgerTx};
pub use postgres::{PgLedgerStore, PgLedgerTx};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt {table} row {id}: {reason}")]
    CorruptRow {
        table: &'static str,
        id: Uuid,
        reason: String,
    },

    #[error("{table} row {id} was written without holding its lock")]
    LockNotHeld { table: &'static str, id: Uuid },
}

/// Factory for ledger transactions plus non-locking reads
#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    type Tx: LedgerTransaction;

    /// Start a new transaction
    async fn begin(&self) -> Result<Self::Tx, LedgerStoreError>;

    /// Read an item's committed state without locking it
    async fn find_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, LedgerStoreError>;

    /// Read a rental's committed state without locking it
    async fn find_rental(&self, rental_id: Uuid)
        -> Result<Option<RentalRecord>, LedgerStoreError>;

    /// All sales recorded against an item
    async fn sales_for_item(&self, item_id: Uuid) -> Result<Vec<SaleRecord>, LedgerStoreError>;
}

/// One unit of work over the ledger tables
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Lock the item row for the rest of the transaction and read it
    async fn lock_item(&mut self, item_id: Uuid)
        -> Result<Option<InventoryItem>, LedgerStoreError>;

    async fn update_item_status(
        &mut self,
        item_id: Uuid,
        status: ItemStatus,
    ) -> Result<(), LedgerStoreError>;

    async fn insert_sale(&mut self, sale: &SaleRecord) -> Result<(), LedgerStoreError>;

    async fn insert_rental(&mut self, rental: &RentalRecord) -> Result<(), LedgerStoreError>;

    /// Lock the rental row for the rest of the transaction and read it
    async fn lock_rental(
        &mut self,
        rental_id: Uuid,
    ) -> Result<Option<RentalRecord>, LedgerStoreError>;

    /// Persist the settlement fields of a rental (status, late fee, completion time)
    async fn update_rental(&mut self, rental: &RentalRecord) -> Result<(), LedgerStoreError>;

    /// Commit all writes and release every lock
    async fn commit(self) -> Result<(), LedgerStoreError>;
}
