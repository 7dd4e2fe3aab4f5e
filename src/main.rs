//! marketplace_ledger - inventory ledger and reference data service

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_ledger::api::{self, AppState};
use marketplace_ledger::clock::{Clock, SystemClock};
use marketplace_ledger::domain::LateFeePolicy;
use marketplace_ledger::handlers::{InventoryLedger, LedgerSettings};
use marketplace_ledger::jobs::{JobScheduler, JobSchedulerConfig};
use marketplace_ledger::ledger::PgLedgerStore;
use marketplace_ledger::notifications::{NotificationQueue, PgNotificationSink};
use marketplace_ledger::reference::{
    HttpTaxonomyClient, PgCacheStore, ReferenceCache, ReferenceCacheStore,
};
use marketplace_ledger::{db, Config};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = %config.environment, "Starting marketplace ledger");
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    db::verify_connection(&pool).await?;
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }
    tracing::info!("Database connected successfully");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Notification outbox
    let (notifications, worker) = NotificationQueue::new(
        config.notification_queue_capacity,
        PgNotificationSink::new(pool.clone()),
    );
    let worker_handle = worker.start(shutdown_rx.clone());

    // Inventory ledger
    let ledger = InventoryLedger::new(
        PgLedgerStore::new(pool.clone()),
        notifications,
        clock.clone(),
        LedgerSettings {
            penalty_per_day: config.rental_penalty_per_day,
            late_fees: LateFeePolicy::new(config.late_fee_grace_days),
        },
    );

    // Reference cache
    let cache_store: Arc<dyn ReferenceCacheStore> = Arc::new(PgCacheStore::new(pool.clone()));
    let taxonomy = HttpTaxonomyClient::new(config.taxonomy_base_url.clone(), config.taxonomy_timeout)?;
    let reference = ReferenceCache::new(
        Arc::new(taxonomy),
        cache_store.clone(),
        clock.clone(),
        config.reference_cache_ttl,
    );

    // Maintenance
    let scheduler_handle = JobScheduler::new(
        cache_store,
        clock,
        JobSchedulerConfig {
            cache_purge_interval: config.cache_purge_interval,
            cache_ttl: config.reference_cache_ttl,
        },
    )
    .start(shutdown_rx);

    let app = api::build_router(AppState::new(ledger, reference));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::warn!(error = %e, "Job scheduler did not stop cleanly");
    }
    if let Err(e) = worker_handle.await {
        tracing::warn!(error = %e, "Notification worker did not stop cleanly");
    }
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
