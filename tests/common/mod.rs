//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use marketplace_ledger::clock::ManualClock;
use marketplace_ledger::domain::{InventoryItem, ItemStatus, LateFeePolicy, Money};
use marketplace_ledger::handlers::{InventoryLedger, LedgerSettings};
use marketplace_ledger::ledger::MemoryLedgerStore;
use marketplace_ledger::notifications::{
    Notification, NotificationError, NotificationQueue, NotificationSink, NotificationWorker,
};
use marketplace_ledger::reference::{
    BrandId, CacheCategory, CacheEntry, CacheStoreError, Make, MemoryCacheStore, Model,
    ReferenceCache, ReferenceCacheStore, TaxonomyClient, UpstreamError,
};

/// 2024-01-01 09:00 UTC
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
}

// =========================================================================
// Ledger fixtures
// =========================================================================

/// Notification sink that remembers everything it was given
#[derive(Clone, Default)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct LedgerHarness {
    pub store: MemoryLedgerStore,
    pub clock: Arc<ManualClock>,
    pub queue: NotificationQueue,
    pub sink: RecordingSink,
    pub ledger: Arc<InventoryLedger<MemoryLedgerStore>>,
    pub worker: Option<NotificationWorker<RecordingSink>>,
}

pub fn ledger_harness() -> LedgerHarness {
    let store = MemoryLedgerStore::new();
    let clock = Arc::new(ManualClock::new(t0()));
    let sink = RecordingSink::default();
    let (queue, worker) = NotificationQueue::new(64, sink.clone());

    let ledger = InventoryLedger::new(
        store.clone(),
        queue.clone(),
        clock.clone(),
        LedgerSettings {
            penalty_per_day: Money::from_units(50_000).unwrap(),
            late_fees: LateFeePolicy::default(),
        },
    );

    LedgerHarness {
        store,
        clock,
        queue,
        sink,
        ledger: Arc::new(ledger),
        worker: Some(worker),
    }
}

/// List an available item owned by a fresh user
pub async fn list_item(
    store: &MemoryLedgerStore,
    sale_price: i64,
    rental_price_per_day: Option<i64>,
) -> InventoryItem {
    let item = InventoryItem {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        title: "Toyota Avanza".to_string(),
        sale_price: Money::from_units(sale_price).unwrap(),
        rental_price_per_day: rental_price_per_day.map(|p| Money::from_units(p).unwrap()),
        status: ItemStatus::Available,
    };
    store.insert_item(item.clone()).await;
    item
}

// =========================================================================
// Reference cache fixtures
// =========================================================================

/// Scripted taxonomy service that counts calls
pub struct FakeTaxonomy {
    calls: AtomicU32,
    makes: Mutex<Vec<Make>>,
    models: Mutex<Vec<Model>>,
    failure: Mutex<Option<UpstreamError>>,
    latency: Duration,
}

impl FakeTaxonomy {
    pub fn new(makes: Vec<Make>) -> Self {
        Self {
            calls: AtomicU32::new(0),
            makes: Mutex::new(makes),
            models: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_models(self, models: Vec<Model>) -> Self {
        *self.models.lock().unwrap() = models;
        self
    }

    /// Every following call fails with `error`
    pub fn fail_with(&self, error: UpstreamError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn set_makes(&self, makes: Vec<Make>) {
        *self.makes.lock().unwrap() = makes;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failure = self.failure.lock().unwrap().clone();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaxonomyClient for FakeTaxonomy {
    async fn fetch_makes(&self) -> Result<Vec<Make>, UpstreamError> {
        self.respond().await?;
        Ok(self.makes.lock().unwrap().clone())
    }

    async fn fetch_models(&self, brand_id: &BrandId) -> Result<Vec<Model>, UpstreamError> {
        self.respond().await?;
        Ok(self
            .models
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.brand_id == brand_id.as_str())
            .cloned()
            .collect())
    }
}

/// Cache store whose reads work but whose writes always fail
#[derive(Clone, Default)]
pub struct ReadOnlyCacheStore {
    pub inner: MemoryCacheStore,
}

#[async_trait]
impl ReferenceCacheStore for ReadOnlyCacheStore {
    async fn load(
        &self,
        category: CacheCategory,
        key: &str,
    ) -> Result<Option<CacheEntry>, CacheStoreError> {
        self.inner.load(category, key).await
    }

    async fn replace_category(&self, _entry: &CacheEntry) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::Unavailable("disk full".to_string()))
    }

    async fn upsert(&self, _entry: &CacheEntry) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::Unavailable("disk full".to_string()))
    }

    async fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64, CacheStoreError> {
        Err(CacheStoreError::Unavailable("disk full".to_string()))
    }
}

pub fn make(brand_id: &str, name: &str) -> Make {
    Make {
        brand_id: brand_id.to_string(),
        name: name.to_string(),
    }
}

pub fn model(model_id: &str, brand_id: &str, name: &str) -> Model {
    Model {
        model_id: model_id.to_string(),
        brand_id: brand_id.to_string(),
        name: name.to_string(),
    }
}

pub fn reference_cache(
    client: Arc<FakeTaxonomy>,
    store: Arc<dyn ReferenceCacheStore>,
    clock: Arc<ManualClock>,
) -> ReferenceCache {
    ReferenceCache::new(client, store, clock, chrono::Duration::hours(24))
}
