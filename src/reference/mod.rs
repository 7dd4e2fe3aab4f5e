//! Reference data module
//!
//! Read-through cache in front of the external vehicle taxonomy service.
//! Fresh entries are served from the [`ReferenceCacheStore`]; misses and
//! expired entries go upstream through a bounded [`RetryPolicy`], with
//! concurrent misses on one key sharing a single upstream call.

mod client;
mod models;
mod retry;
mod service;
mod single_flight;
mod store;

pub use client::{HttpTaxonomyClient, TaxonomyClient, UpstreamError};
pub use models::{BrandId, CacheCategory, CacheEntry, CacheKey, Make, Model};
pub use retry::RetryPolicy;
pub use service::ReferenceCache;
pub use single_flight::SingleFlight;
pub use store::{CacheStoreError, MemoryCacheStore, PgCacheStore, ReferenceCacheStore};

/// Errors surfaced to reference-cache callers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Taxonomy service unavailable: {0}")]
    UpstreamUnavailable(String),
}
