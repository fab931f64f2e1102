use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::ttl::{lock, TtlCache};

/// Error handed to every caller that joined a failed fetch.
pub type SharedError = Arc<anyhow::Error>;

pub(super) type InFlight<V> = Shared<BoxFuture<'static, Result<V, SharedError>>>;

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Read-through lookup with request coalescing.
    ///
    /// On a miss, the first caller starts `fetch`; callers arriving while it
    /// is in flight await the same result instead of issuing their own. The
    /// in-flight slot is released once the fetch settles, whatever the
    /// outcome. A successful value is stored only if `should_cache` accepts it.
    pub async fn get_or_fetch<F, Fut, E, P>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
        should_cache: P,
    ) -> Result<V, SharedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        P: Fn(&V) -> bool + Send + 'static,
    {
        if let Some(value) = self.get(key) {
            debug!(key, "cache hit");
            return Ok(value);
        }

        let pending = {
            let mut in_flight = lock(&self.inner.in_flight);
            if let Some(existing) = in_flight.get(key) {
                debug!(key, "joining in-flight request");
                existing.clone()
            } else if let Some(value) = self.get(key) {
                // Settled between the first lookup and taking the lock
                return Ok(value);
            } else {
                let inner = Arc::clone(&self.inner);
                let owned_key = key.to_string();
                let request = fetch();
                let pending = async move {
                    let result = request.await.map_err(|e| Arc::new(e.into()));
                    if let Ok(value) = &result {
                        if should_cache(value) {
                            inner.set(owned_key.clone(), value.clone(), ttl);
                        }
                    }
                    lock(&inner.in_flight).remove(&owned_key);
                    result
                }
                .boxed()
                .shared();
                in_flight.insert(key.to_string(), pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Number of fetches currently in flight.
    pub fn in_flight_len(&self) -> usize {
        lock(&self.inner.in_flight).len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::DEFAULT_TTL;
    use crate::clock::{ManualClock, TokioClock};

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_fetch() {
        let cache: TtlCache<String> = TtlCache::new(Arc::new(TokioClock));
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, anyhow::Error>("payload".to_string())
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("stats-data", DEFAULT_TTL, fetch(calls.clone()), |_| true),
            cache.get_or_fetch("stats-data", DEFAULT_TTL, fetch(calls.clone()), |_| true),
        );

        assert_eq!(a.unwrap(), "payload");
        assert_eq!(b.unwrap(), "payload");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_len(), 0);
        assert_eq!(cache.get("stats-data"), Some("payload".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_slot_released() {
        let cache: TtlCache<String> = TtlCache::new(Arc::new(TokioClock));
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err::<String, _>(anyhow::anyhow!("upstream down"))
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("k", DEFAULT_TTL, failing(calls.clone()), |_| true),
            cache.get_or_fetch("k", DEFAULT_TTL, failing(calls.clone()), |_| true),
        );

        assert_eq!(a.unwrap_err().to_string(), "upstream down");
        assert!(b.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_len(), 0);
        assert!(cache.get("k").is_none());

        // A later call starts a fresh fetch
        let _ = cache
            .get_or_fetch("k", DEFAULT_TTL, failing(calls.clone()), |_| true)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_values_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new(Arc::new(ManualClock::new()));

        let value = cache
            .get_or_fetch("k", DEFAULT_TTL, || async { Ok::<_, anyhow::Error>(7) }, |v| *v > 10)
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert!(cache.get("k").is_none());
        assert_eq!(cache.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let cache: TtlCache<u32> = TtlCache::new(Arc::new(ManualClock::new()));
        cache.set("k", 1, DEFAULT_TTL);

        let value = cache
            .get_or_fetch(
                "k",
                DEFAULT_TTL,
                || async { Err::<u32, _>(anyhow::anyhow!("must not run")) },
                |_| true,
            )
            .await
            .unwrap();
        assert_eq!(value, 1);
    }
}
