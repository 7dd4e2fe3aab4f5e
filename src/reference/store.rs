//! Persistence for reference-cache entries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{CacheCategory, CacheEntry};

/// Cache storage errors
#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown cache category: {0}")]
    UnknownCategory(String),

    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
}

/// Storage behind the reference cache.
///
/// Writes never mix stale and fresh data under one key: a category
/// replacement swaps every row of the category at once, an upsert swaps
/// the whole payload of one key.
#[async_trait]
pub trait ReferenceCacheStore: Send + Sync + 'static {
    async fn load(
        &self,
        category: CacheCategory,
        key: &str,
    ) -> Result<Option<CacheEntry>, CacheStoreError>;

    /// Delete every entry of `entry.category` and write `entry` in its place
    async fn replace_category(&self, entry: &CacheEntry) -> Result<(), CacheStoreError>;

    /// Insert or overwrite the single entry `(entry.category, entry.key)`
    async fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheStoreError>;

    /// Remove entries fetched before `cutoff`, returning how many went
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheStoreError>;
}

// =========================================================================
// PostgreSQL
// =========================================================================

/// `cache_entries` table store
#[derive(Debug, Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    category: String,
    key: String,
    payload: serde_json::Value,
    fetched_at: DateTime<Utc>,
}

fn parse_category(raw: &str) -> Result<CacheCategory, CacheStoreError> {
    match raw {
        "makes" => Ok(CacheCategory::Makes),
        "models" => Ok(CacheCategory::Models),
        other => Err(CacheStoreError::UnknownCategory(other.to_string())),
    }
}

impl TryFrom<CacheRow> for CacheEntry {
    type Error = CacheStoreError;

    fn try_from(row: CacheRow) -> Result<Self, Self::Error> {
        Ok(CacheEntry {
            category: parse_category(&row.category)?,
            key: row.key,
            payload: row.payload,
            fetched_at: row.fetched_at,
        })
    }
}

const UPSERT_SQL: &str = r#"
    INSERT INTO cache_entries (category, key, payload, fetched_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (category, key)
    DO UPDATE SET payload = EXCLUDED.payload, fetched_at = EXCLUDED.fetched_at
"#;

#[async_trait]
impl ReferenceCacheStore for PgCacheStore {
    async fn load(
        &self,
        category: CacheCategory,
        key: &str,
    ) -> Result<Option<CacheEntry>, CacheStoreError> {
        let row: Option<CacheRow> = sqlx::query_as(
            r#"
            SELECT category, key, payload, fetched_at
            FROM cache_entries
            WHERE category = $1 AND key = $2
            "#,
        )
        .bind(category.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CacheEntry::try_from).transpose()
    }

    async fn replace_category(&self, entry: &CacheEntry) -> Result<(), CacheStoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cache_entries WHERE category = $1")
            .bind(entry.category.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(UPSERT_SQL)
            .bind(entry.category.as_str())
            .bind(&entry.key)
            .bind(&entry.payload)
            .bind(entry.fetched_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheStoreError> {
        sqlx::query(UPSERT_SQL)
            .bind(entry.category.as_str())
            .bind(&entry.key)
            .bind(&entry.payload)
            .bind(entry.fetched_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheStoreError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE fetched_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =========================================================================
// In-memory
// =========================================================================

/// In-memory store (for development/testing)
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<(CacheCategory, String), CacheEntry>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ReferenceCacheStore for MemoryCacheStore {
    async fn load(
        &self,
        category: CacheCategory,
        key: &str,
    ) -> Result<Option<CacheEntry>, CacheStoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(category, key.to_string())).cloned())
    }

    async fn replace_category(&self, entry: &CacheEntry) -> Result<(), CacheStoreError> {
        let mut entries = self.entries.write().await;
        entries.retain(|(category, _), _| *category != entry.category);
        entries.insert((entry.category, entry.key.clone()), entry.clone());
        Ok(())
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheStoreError> {
        let mut entries = self.entries.write().await;
        entries.insert((entry.category, entry.key.clone()), entry.clone());
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheStoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.fetched_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{BrandId, CacheKey};
    use chrono::Duration;
    use serde_json::json;

    fn models_entry(brand: &str, at: DateTime<Utc>) -> CacheEntry {
        let key = CacheKey::Models(BrandId::parse(brand).unwrap());
        CacheEntry::new(&key, json!([{ "model_id": "1", "brand_id": brand, "name": "X" }]), at)
    }

    #[tokio::test]
    async fn test_upsert_leaves_other_brands_untouched() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();

        store.upsert(&models_entry("440", now)).await.unwrap();
        store.upsert(&models_entry("474", now)).await.unwrap();
        store
            .upsert(&models_entry("440", now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        let honda = store
            .load(CacheCategory::Models, "474")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(honda.fetched_at, now);
    }

    #[tokio::test]
    async fn test_replace_category_is_wholesale() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();

        store
            .upsert(&CacheEntry {
                category: CacheCategory::Makes,
                key: "legacy".to_string(),
                payload: json!([]),
                fetched_at: now,
            })
            .await
            .unwrap();
        store.upsert(&models_entry("440", now)).await.unwrap();

        let fresh = CacheEntry::new(&CacheKey::Makes, json!([]), now);
        store.replace_category(&fresh).await.unwrap();

        assert!(store
            .load(CacheCategory::Makes, "legacy")
            .await
            .unwrap()
            .is_none());
        assert!(store.load(CacheCategory::Makes, "all").await.unwrap().is_some());
        assert!(store.load(CacheCategory::Models, "440").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();

        store
            .upsert(&models_entry("440", now - Duration::hours(30)))
            .await
            .unwrap();
        store.upsert(&models_entry("474", now)).await.unwrap();

        let purged = store
            .purge_older_than(now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_unknown_category_row_rejected() {
        let row = CacheRow {
            category: "trims".to_string(),
            key: "1".to_string(),
            payload: json!([]),
            fetched_at: Utc::now(),
        };
        assert!(matches!(
            CacheEntry::try_from(row),
            Err(CacheStoreError::UnknownCategory(_))
        ));
    }
}
