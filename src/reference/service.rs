//! Read-through reference cache

use chrono::Duration;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::domain::AuthContext;

use super::{
    BrandId, CacheEntry, CacheError, CacheKey, Make, Model, ReferenceCacheStore, RetryPolicy,
    SingleFlight, TaxonomyClient,
};

/// Brand/model lookups served from the cache while fresh, from upstream otherwise.
///
/// Expired entries are never served: once an entry is past its TTL the
/// caller gets either fresh upstream data or `UpstreamUnavailable`.
pub struct ReferenceCache {
    client: Arc<dyn TaxonomyClient>,
    store: Arc<dyn ReferenceCacheStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    ttl: Duration,
    makes: SingleFlight<CacheKey, Vec<Make>>,
    models: SingleFlight<CacheKey, Vec<Model>>,
}

impl ReferenceCache {
    pub fn new(
        client: Arc<dyn TaxonomyClient>,
        store: Arc<dyn ReferenceCacheStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            store,
            clock,
            retry: RetryPolicy::default(),
            ttl,
            makes: SingleFlight::new(),
            models: SingleFlight::new(),
        }
    }

    /// All known brands, sorted by name
    pub async fn get_makes(&self, ctx: &AuthContext) -> Result<Vec<Make>, CacheError> {
        let key = CacheKey::Makes;

        if let Some(makes) = self.lookup::<Vec<Make>>(&key, ctx).await {
            return Ok(makes);
        }

        let client = self.client.clone();
        let store = self.store.clone();
        let clock = self.clock.clone();
        let retry = self.retry;
        let flight_key = key.clone();

        self.makes
            .run(key, move || {
                async move {
                    let mut makes = retry
                        .run("fetch_makes", || client.fetch_makes())
                        .await
                        .map_err(|e| CacheError::UpstreamUnavailable(e.to_string()))?;
                    makes.sort_by(|a, b| a.name.cmp(&b.name));

                    info!(count = makes.len(), "Fetched makes from taxonomy service");
                    persist_in_background(store, &flight_key, &makes, clock.as_ref());
                    Ok(makes)
                }
                .boxed()
            })
            .await
    }

    /// Models of one brand, sorted by name
    pub async fn get_models_for_make(
        &self,
        ctx: &AuthContext,
        brand_id: &str,
    ) -> Result<Vec<Model>, CacheError> {
        let brand_id = BrandId::parse(brand_id)?;
        let key = CacheKey::Models(brand_id.clone());

        if let Some(models) = self.lookup::<Vec<Model>>(&key, ctx).await {
            return Ok(models);
        }

        let client = self.client.clone();
        let store = self.store.clone();
        let clock = self.clock.clone();
        let retry = self.retry;
        let flight_key = key.clone();

        self.models
            .run(key, move || {
                async move {
                    let mut models = retry
                        .run("fetch_models", || client.fetch_models(&brand_id))
                        .await
                        .map_err(|e| CacheError::UpstreamUnavailable(e.to_string()))?;
                    models.sort_by(|a, b| a.name.cmp(&b.name));

                    info!(
                        brand_id = %brand_id,
                        count = models.len(),
                        "Fetched models from taxonomy service"
                    );
                    persist_in_background(store, &flight_key, &models, clock.as_ref());
                    Ok(models)
                }
                .boxed()
            })
            .await
    }

    /// A fresh, non-empty cached payload, if any. Store failures count as a miss.
    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey, ctx: &AuthContext) -> Option<T> {
        let entry = match self.store.load(key.category(), key.key()).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(%key, correlation_id = ?ctx.correlation_id, "Reference cache miss");
                return None;
            }
            Err(e) => {
                warn!(%key, error = %e, "Reference cache read failed, fetching upstream");
                return None;
            }
        };

        if !entry.is_fresh(self.clock.now(), self.ttl) {
            debug!(
                %key,
                fetched_at = %entry.fetched_at,
                correlation_id = ?ctx.correlation_id,
                "Reference cache entry expired"
            );
            return None;
        }

        // An empty list means upstream had nothing when it was cached; ask again
        if entry.payload.as_array().is_some_and(|items| items.is_empty()) {
            debug!(%key, correlation_id = ?ctx.correlation_id, "Empty reference cache entry");
            return None;
        }

        match serde_json::from_value(entry.payload) {
            Ok(payload) => {
                debug!(%key, correlation_id = ?ctx.correlation_id, "Reference cache hit");
                Some(payload)
            }
            Err(e) => {
                warn!(%key, error = %e, "Unreadable reference cache entry, fetching upstream");
                None
            }
        }
    }
}

/// Write a fetched payload to the store without making anyone wait for it
fn persist_in_background<T: Serialize>(
    store: Arc<dyn ReferenceCacheStore>,
    key: &CacheKey,
    payload: &T,
    clock: &dyn Clock,
) {
    let payload = match serde_json::to_value(payload) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(%key, error = %e, "Could not encode reference payload for caching");
            return;
        }
    };
    let entry = CacheEntry::new(key, payload, clock.now());
    let key = key.clone();

    tokio::spawn(async move {
        let result = match key {
            CacheKey::Makes => store.replace_category(&entry).await,
            CacheKey::Models(_) => store.upsert(&entry).await,
        };
        match result {
            Ok(()) => debug!(%key, "Reference cache entry stored"),
            Err(e) => warn!(%key, error = %e, "Failed to store reference cache entry"),
        }
    });
}
