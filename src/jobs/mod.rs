//! Scheduled Jobs
//!
//! Background maintenance run on a fixed interval.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;

use crate::clock::Clock;
use crate::reference::{CacheStoreError, ReferenceCacheStore};

// =========================================================================
// Expired cache entry purge
// =========================================================================

/// Delete reference-cache entries that can no longer satisfy a read
pub async fn purge_expired_cache_entries(
    store: &dyn ReferenceCacheStore,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> Result<u64, JobError> {
    let rows_deleted = store.purge_older_than(now - ttl).await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted, "Purged expired reference cache entries");
    }

    Ok(rows_deleted)
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Shortest purge period the scheduler will run at
const MIN_PURGE_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for the cache purge (default: 1 hour)
    pub cache_purge_interval: Duration,
    /// Age past which cache entries are purged (default: 24 hours)
    pub cache_ttl: chrono::Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            cache_purge_interval: Duration::from_secs(3600),
            cache_ttl: chrono::Duration::hours(24),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    cache_store: Arc<dyn ReferenceCacheStore>,
    clock: Arc<dyn Clock>,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(
        cache_store: Arc<dyn ReferenceCacheStore>,
        clock: Arc<dyn Clock>,
        config: JobSchedulerConfig,
    ) -> Self {
        Self {
            cache_store,
            clock,
            config,
        }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that completes once shutdown is signalled
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Job scheduler started");

        let mut purge_interval = interval(self.config.cache_purge_interval.max(MIN_PURGE_INTERVAL));

        loop {
            tokio::select! {
                _ = purge_interval.tick() => {
                    if let Err(e) = self.purge_once().await {
                        tracing::error!(error = %e, "Reference cache purge failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Job scheduler stopped");
    }

    /// Run every maintenance job once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self.purge_once().await {
            Ok(count) => report.cache_entries_purged = count,
            Err(e) => report.errors.push(format!("Cache purge: {}", e)),
        }

        report.completed_at = self.clock.now();
        report
    }

    async fn purge_once(&self) -> Result<u64, JobError> {
        purge_expired_cache_entries(
            self.cache_store.as_ref(),
            self.clock.now(),
            self.config.cache_ttl,
        )
        .await
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub cache_entries_purged: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Cache store error: {0}")]
    CacheStore(#[from] CacheStoreError),
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::reference::{BrandId, CacheEntry, CacheKey, MemoryCacheStore};
    use chrono::TimeZone;

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.cache_purge_interval, Duration::from_secs(3600));
        assert_eq!(config.cache_ttl, chrono::Duration::hours(24));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_does_not_kill_scheduler() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let scheduler = JobScheduler::new(
            Arc::new(MemoryCacheStore::new()),
            Arc::new(ManualClock::new(now)),
            JobSchedulerConfig {
                cache_purge_interval: Duration::ZERO,
                ..JobSchedulerConfig::default()
            },
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = scheduler.start(shutdown_rx);
        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown_tx.send(true).unwrap();

        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_run_all_once_purges_only_expired() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let store = MemoryCacheStore::new();
        let old = CacheEntry::new(
            &CacheKey::Models(BrandId::parse("440").unwrap()),
            serde_json::json!([]),
            now - chrono::Duration::hours(25),
        );
        let fresh = CacheEntry::new(&CacheKey::Makes, serde_json::json!([]), now);
        store.upsert(&old).await.unwrap();
        store.upsert(&fresh).await.unwrap();

        let scheduler = JobScheduler::new(
            Arc::new(store.clone()),
            Arc::new(ManualClock::new(now)),
            JobSchedulerConfig::default(),
        );
        let report = scheduler.run_all_once().await;

        assert_eq!(report.cache_entries_purged, 1);
        assert!(report.errors.is_empty());
        assert_eq!(report.completed_at, now);
        assert_eq!(store.len().await, 1);
    }
}
