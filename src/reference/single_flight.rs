//! Collapses concurrent fetches for the same key into one

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use super::CacheError;

type Fetch<V> = BoxFuture<'static, Result<V, CacheError>>;

/// At most one in-flight fetch per key, shared by every concurrent caller.
///
/// The map only keeps weak handles, so the fetch lives exactly as long as
/// at least one caller is still waiting on it.
pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, (u64, WeakShared<Fetch<V>>)>>,
    generation: AtomicU64,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the fetch in flight for `key`, or start one with `start`
    pub async fn run<F>(&self, key: K, start: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> Fetch<V>,
    {
        let (generation, shared) = self.join_or_start(&key, start);
        let result = shared.await;

        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(inflight.get(&key), Some((current, _)) if *current == generation) {
            inflight.remove(&key);
        }
        result
    }

    /// Number of keys with a fetch that may still be running
    pub fn in_flight(&self) -> usize {
        let inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        inflight
            .values()
            .filter(|(_, weak)| weak.upgrade().is_some())
            .count()
    }

    fn join_or_start<F>(&self, key: &K, start: F) -> (u64, Shared<Fetch<V>>)
    where
        F: FnOnce() -> Fetch<V>,
    {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((generation, weak)) = inflight.get(key) {
            if let Some(shared) = weak.upgrade() {
                return (*generation, shared);
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let shared = start().shared();
        if let Some(weak) = shared.downgrade() {
            inflight.insert(key.clone(), (generation, weak));
        }
        (generation, shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let flight = Arc::new(SingleFlight::<&'static str, u32>::new());
        let starts = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let starts = starts.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run("makes", || {
                        starts.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            Ok(42)
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_not_cached() {
        let flight = SingleFlight::<u8, u32>::new();

        let first = flight
            .run(1, || {
                async { Err(CacheError::UpstreamUnavailable("down".to_string())) }.boxed()
            })
            .await;
        assert!(first.is_err());

        let second = flight.run(1, || async { Ok(5) }.boxed()).await;
        assert_eq!(second, Ok(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_dropped_when_every_caller_cancels() {
        let flight = SingleFlight::<u8, u32>::new();
        let finished = Arc::new(AtomicU32::new(0));

        let marker = finished.clone();
        let waiting = flight.run(1, move || {
            async move {
                tokio::time::sleep(Duration::from_secs(4)).await;
                marker.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
            .boxed()
        });
        let timed_out = tokio::time::timeout(Duration::from_secs(1), waiting).await;
        assert!(timed_out.is_err());
        assert_eq!(flight.in_flight(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
