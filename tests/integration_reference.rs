//! Reference cache integration tests

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;

use marketplace_ledger::clock::ManualClock;
use marketplace_ledger::domain::AuthContext;
use marketplace_ledger::reference::{
    CacheCategory, CacheEntry, CacheError, CacheKey, MemoryCacheStore, ReferenceCacheStore,
    UpstreamError,
};

mod common;

use common::{make, model, FakeTaxonomy, ReadOnlyCacheStore};

/// Let spawned persist tasks run until the store holds `expected` entries
async fn wait_for_entries(store: &MemoryCacheStore, expected: usize) {
    for _ in 0..100 {
        if store.len().await >= expected {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("store never reached {} entries", expected);
}

async fn seed_makes(store: &impl ReferenceCacheStore, makes: serde_json::Value) {
    let entry = CacheEntry::new(&CacheKey::Makes, makes, common::t0());
    store.replace_category(&entry).await.unwrap();
}

#[tokio::test]
async fn test_fresh_entry_served_without_upstream_call() {
    let store = ReadOnlyCacheStore::default();
    seed_makes(
        &store.inner,
        serde_json::json!([{ "brand_id": "440", "name": "Aston Martin" }]),
    )
    .await;

    let upstream = Arc::new(FakeTaxonomy::new(vec![make("441", "Tesla")]));
    let clock = Arc::new(ManualClock::new(common::t0()));
    let cache = common::reference_cache(upstream.clone(), Arc::new(store), clock.clone());
    let ctx = AuthContext::anonymous();

    clock.advance(ChronoDuration::hours(23) + ChronoDuration::minutes(59));
    let makes = cache.get_makes(&ctx).await.unwrap();
    assert_eq!(makes, vec![make("440", "Aston Martin")]);
    assert_eq!(upstream.calls(), 0);

    clock.set(common::t0() + ChronoDuration::hours(24) + ChronoDuration::minutes(1));
    let makes = cache.get_makes(&ctx).await.unwrap();
    assert_eq!(makes, vec![make("441", "Tesla")]);
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_failed_persist_still_returns_data() {
    let upstream = Arc::new(FakeTaxonomy::new(vec![make("448", "Toyota")]));
    let clock = Arc::new(ManualClock::new(common::t0()));
    let store = Arc::new(ReadOnlyCacheStore::default());
    let cache = common::reference_cache(upstream.clone(), store.clone(), clock);
    let ctx = AuthContext::anonymous();

    assert_eq!(cache.get_makes(&ctx).await.unwrap().len(), 1);
    tokio::task::yield_now().await;
    assert!(store.inner.is_empty().await);

    // Nothing was cached, so the next call goes upstream again
    cache.get_makes(&ctx).await.unwrap();
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn test_fetched_makes_are_persisted_and_reused() {
    let upstream = Arc::new(FakeTaxonomy::new(vec![
        make("448", "Toyota"),
        make("474", "Honda"),
        make("440", "Aston Martin"),
    ]));
    let clock = Arc::new(ManualClock::new(common::t0()));
    let store = MemoryCacheStore::new();
    let cache = common::reference_cache(upstream.clone(), Arc::new(store.clone()), clock);
    let ctx = AuthContext::anonymous();

    let makes = cache.get_makes(&ctx).await.unwrap();
    let names: Vec<_> = makes.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Aston Martin", "Honda", "Toyota"]);

    wait_for_entries(&store, 1).await;
    let entry = store
        .load(CacheCategory::Makes, "all")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.fetched_at, common::t0());

    assert_eq!(cache.get_makes(&ctx).await.unwrap(), makes);
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_models_sorted_and_cached_per_brand() {
    let upstream = Arc::new(FakeTaxonomy::new(Vec::new()).with_models(vec![
        model("2469", "448", "Corolla"),
        model("2208", "448", "Camry"),
        model("1861", "474", "Accord"),
    ]));
    let clock = Arc::new(ManualClock::new(common::t0()));
    let store = MemoryCacheStore::new();
    let cache = common::reference_cache(upstream.clone(), Arc::new(store.clone()), clock);
    let ctx = AuthContext::anonymous();

    let toyota = cache.get_models_for_make(&ctx, "448").await.unwrap();
    let names: Vec<_> = toyota.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Camry", "Corolla"]);
    wait_for_entries(&store, 1).await;

    let honda = cache.get_models_for_make(&ctx, " 474 ").await.unwrap();
    assert_eq!(honda, vec![model("1861", "474", "Accord")]);
    wait_for_entries(&store, 2).await;

    // Both brands now served from the cache
    cache.get_models_for_make(&ctx, "448").await.unwrap();
    cache.get_models_for_make(&ctx, "474").await.unwrap();
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn test_invalid_brand_id_rejected_before_upstream() {
    let upstream = Arc::new(FakeTaxonomy::new(Vec::new()));
    let clock = Arc::new(ManualClock::new(common::t0()));
    let cache = common::reference_cache(
        upstream.clone(),
        Arc::new(MemoryCacheStore::new()),
        clock,
    );

    for raw in ["", "   ", "abc", "12a", "-5"] {
        let err = cache
            .get_models_for_make(&AuthContext::anonymous(), raw)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)), "{:?}", raw);
    }
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_retried_then_unavailable() {
    let upstream = Arc::new(FakeTaxonomy::new(Vec::new()));
    upstream.fail_with(UpstreamError::Status(500));
    let clock = Arc::new(ManualClock::new(common::t0()));
    let cache = common::reference_cache(
        upstream.clone(),
        Arc::new(MemoryCacheStore::new()),
        clock,
    );

    let started = tokio::time::Instant::now();
    let err = cache
        .get_makes(&AuthContext::anonymous())
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::UpstreamUnavailable(_)));
    assert_eq!(upstream.calls(), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(7), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_client_errors_not_retried() {
    let upstream = Arc::new(FakeTaxonomy::new(Vec::new()));
    upstream.fail_with(UpstreamError::Status(400));
    let clock = Arc::new(ManualClock::new(common::t0()));
    let cache = common::reference_cache(
        upstream.clone(),
        Arc::new(MemoryCacheStore::new()),
        clock,
    );

    let err = cache
        .get_models_for_make(&AuthContext::anonymous(), "448")
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::UpstreamUnavailable(_)));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_never_served_when_upstream_down() {
    let store = MemoryCacheStore::new();
    seed_makes(
        &store,
        serde_json::json!([{ "brand_id": "448", "name": "Toyota" }]),
    )
    .await;

    let upstream = Arc::new(FakeTaxonomy::new(Vec::new()));
    upstream.fail_with(UpstreamError::Transport("connection refused".to_string()));
    let clock = Arc::new(ManualClock::new(common::t0() + ChronoDuration::hours(25)));
    let cache = common::reference_cache(upstream.clone(), Arc::new(store.clone()), clock);

    let err = cache
        .get_makes(&AuthContext::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::UpstreamUnavailable(_)));
    assert_eq!(upstream.calls(), 3);

    // The stale entry is left in place for the purge job
    assert_eq!(store.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_misses_share_one_upstream_call() {
    let upstream = Arc::new(
        FakeTaxonomy::new(vec![make("448", "Toyota")]).with_latency(Duration::from_millis(200)),
    );
    let clock = Arc::new(ManualClock::new(common::t0()));
    let cache = common::reference_cache(
        upstream.clone(),
        Arc::new(MemoryCacheStore::new()),
        clock,
    );
    let ctx = AuthContext::anonymous();

    let callers = (0..10).map(|_| cache.get_makes(&ctx));
    let results = futures::future::join_all(callers).await;

    assert_eq!(upstream.calls(), 1);
    for result in results {
        assert_eq!(result.unwrap(), vec![make("448", "Toyota")]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_is_not_remembered() {
    let upstream = Arc::new(FakeTaxonomy::new(vec![make("448", "Toyota")]));
    upstream.fail_with(UpstreamError::Status(503));
    let clock = Arc::new(ManualClock::new(common::t0()));
    let cache = common::reference_cache(
        upstream.clone(),
        Arc::new(MemoryCacheStore::new()),
        clock,
    );
    let ctx = AuthContext::anonymous();

    assert!(cache.get_makes(&ctx).await.is_err());
    assert_eq!(upstream.calls(), 3);

    upstream.recover();
    assert_eq!(cache.get_makes(&ctx).await.unwrap().len(), 1);
    assert_eq!(upstream.calls(), 4);
}

#[tokio::test]
async fn test_empty_cached_list_is_refetched() {
    let store = MemoryCacheStore::new();
    seed_makes(&store, serde_json::json!([])).await;

    let upstream = Arc::new(FakeTaxonomy::new(vec![make("448", "Toyota")]));
    let clock = Arc::new(ManualClock::new(common::t0() + ChronoDuration::hours(1)));
    let cache = common::reference_cache(upstream.clone(), Arc::new(store), clock);

    let makes = cache.get_makes(&AuthContext::anonymous()).await.unwrap();
    assert_eq!(makes, vec![make("448", "Toyota")]);
    assert_eq!(upstream.calls(), 1);
}
