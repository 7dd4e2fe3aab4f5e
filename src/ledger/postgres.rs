//! PostgreSQL ledger store
//!
//! Row locks are taken with `SELECT ... FOR UPDATE` inside a sqlx
//! transaction; dropping [`PgLedgerTx`] without committing rolls back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{InventoryItem, ItemStatus, Money, RentalRecord, SaleRecord};

use super::{LedgerStore, LedgerStoreError, LedgerTransaction};

const ITEM_COLUMNS: &str = "id, owner_id, title, sale_price, rental_price_per_day, status";

const RENTAL_COLUMNS: &str = "id, item_id, owner_id, renter_id, start_date, end_date, amount, \
     penalty_per_day, late_fee, status, created_at, completed_at";

const SALE_COLUMNS: &str = "id, item_id, seller_id, buyer_id, amount, status, created_at";

/// Ledger store backed by a shared connection pool
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// An open PostgreSQL transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<PgLedgerTx, LedgerStoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerTx { tx })
    }

    async fn find_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, LedgerStoreError> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let row: Option<ItemRow> = sqlx::query_as(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(InventoryItem::try_from).transpose()
    }

    async fn find_rental(
        &self,
        rental_id: Uuid,
    ) -> Result<Option<RentalRecord>, LedgerStoreError> {
        let sql = format!("SELECT {} FROM rentals WHERE id = $1", RENTAL_COLUMNS);
        let row: Option<RentalRow> = sqlx::query_as(&sql)
            .bind(rental_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RentalRecord::try_from).transpose()
    }

    async fn sales_for_item(&self, item_id: Uuid) -> Result<Vec<SaleRecord>, LedgerStoreError> {
        let sql = format!(
            "SELECT {} FROM sales WHERE item_id = $1 ORDER BY created_at",
            SALE_COLUMNS
        );
        let rows: Vec<SaleRow> = sqlx::query_as(&sql)
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(SaleRecord::try_from).collect()
    }
}

#[async_trait]
impl LedgerTransaction for PgLedgerTx {
    async fn lock_item(
        &mut self,
        item_id: Uuid,
    ) -> Result<Option<InventoryItem>, LedgerStoreError> {
        let sql = format!("SELECT {} FROM items WHERE id = $1 FOR UPDATE", ITEM_COLUMNS);
        let row: Option<ItemRow> = sqlx::query_as(&sql)
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(InventoryItem::try_from).transpose()
    }

    async fn update_item_status(
        &mut self,
        item_id: Uuid,
        status: ItemStatus,
    ) -> Result<(), LedgerStoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE items
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(LedgerStoreError::CorruptRow {
                table: "items",
                id: item_id,
                reason: "row disappeared while locked".to_string(),
            });
        }
        Ok(())
    }

    async fn insert_sale(&mut self, sale: &SaleRecord) -> Result<(), LedgerStoreError> {
        sqlx::query(
            r#"
            INSERT INTO sales (id, item_id, seller_id, buyer_id, amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(sale.id)
        .bind(sale.item_id)
        .bind(sale.seller_id)
        .bind(sale.buyer_id)
        .bind(sale.amount.value())
        .bind(sale.status.as_str())
        .bind(sale.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_rental(&mut self, rental: &RentalRecord) -> Result<(), LedgerStoreError> {
        sqlx::query(
            r#"
            INSERT INTO rentals (
                id, item_id, owner_id, renter_id, start_date, end_date,
                amount, penalty_per_day, late_fee, status, created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(rental.id)
        .bind(rental.item_id)
        .bind(rental.owner_id)
        .bind(rental.renter_id)
        .bind(rental.start_date)
        .bind(rental.end_date)
        .bind(rental.amount.value())
        .bind(rental.penalty_per_day.value())
        .bind(rental.late_fee.value())
        .bind(rental.status.as_str())
        .bind(rental.created_at)
        .bind(rental.completed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_rental(
        &mut self,
        rental_id: Uuid,
    ) -> Result<Option<RentalRecord>, LedgerStoreError> {
        let sql = format!(
            "SELECT {} FROM rentals WHERE id = $1 FOR UPDATE",
            RENTAL_COLUMNS
        );
        let row: Option<RentalRow> = sqlx::query_as(&sql)
            .bind(rental_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(RentalRecord::try_from).transpose()
    }

    async fn update_rental(&mut self, rental: &RentalRecord) -> Result<(), LedgerStoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE rentals
            SET status = $2, late_fee = $3, completed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(rental.id)
        .bind(rental.status.as_str())
        .bind(rental.late_fee.value())
        .bind(rental.completed_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(LedgerStoreError::CorruptRow {
                table: "rentals",
                id: rental.id,
                reason: "row disappeared while locked".to_string(),
            });
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerStoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// =========================================================================
// Row mapping
// =========================================================================

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    sale_price: Decimal,
    rental_price_per_day: Option<Decimal>,
    status: String,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: Uuid,
    item_id: Uuid,
    seller_id: Uuid,
    buyer_id: Uuid,
    amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct RentalRow {
    id: Uuid,
    item_id: Uuid,
    owner_id: Uuid,
    renter_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    amount: Decimal,
    penalty_per_day: Decimal,
    late_fee: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

fn corrupt(table: &'static str, id: Uuid) -> impl Fn(String) -> LedgerStoreError {
    move |reason| LedgerStoreError::CorruptRow { table, id, reason }
}

fn money(table: &'static str, id: Uuid, value: Decimal) -> Result<Money, LedgerStoreError> {
    Money::new(value).map_err(|e| corrupt(table, id)(e.to_string()))
}

impl TryFrom<ItemRow> for InventoryItem {
    type Error = LedgerStoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let rental_price_per_day = row
            .rental_price_per_day
            .map(|rate| money("items", row.id, rate))
            .transpose()?;

        Ok(InventoryItem {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            sale_price: money("items", row.id, row.sale_price)?,
            rental_price_per_day,
            status: row.status.parse().map_err(corrupt("items", row.id))?,
        })
    }
}

impl TryFrom<SaleRow> for SaleRecord {
    type Error = LedgerStoreError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        Ok(SaleRecord {
            id: row.id,
            item_id: row.item_id,
            seller_id: row.seller_id,
            buyer_id: row.buyer_id,
            amount: money("sales", row.id, row.amount)?,
            status: row.status.parse().map_err(corrupt("sales", row.id))?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<RentalRow> for RentalRecord {
    type Error = LedgerStoreError;

    fn try_from(row: RentalRow) -> Result<Self, Self::Error> {
        Ok(RentalRecord {
            id: row.id,
            item_id: row.item_id,
            owner_id: row.owner_id,
            renter_id: row.renter_id,
            start_date: row.start_date,
            end_date: row.end_date,
            amount: money("rentals", row.id, row.amount)?,
            penalty_per_day: money("rentals", row.id, row.penalty_per_day)?,
            late_fee: money("rentals", row.id, row.late_fee)?,
            status: row.status.parse().map_err(corrupt("rentals", row.id))?,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}
