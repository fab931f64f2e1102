use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use regex::Regex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::coalesce::InFlight;
use crate::clock::Clock;

/// Default entry lifetime: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

/// How often the background sweeper evicts expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub recorded_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.age_at(now) < self.ttl
    }

    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.recorded_at)
    }
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub(super) struct Inner<V> {
    pub(super) entries: Mutex<HashMap<String, CacheEntry<V>>>,
    pub(super) in_flight: Mutex<HashMap<String, InFlight<V>>>,
    pub(super) clock: Arc<dyn Clock>,
}

impl<V: Clone> Inner<V> {
    pub(super) fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        match entries.get(key) {
            Some(entry) if entry.is_valid_at(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    pub(super) fn set(&self, key: String, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            recorded_at: self.clock.now(),
            ttl,
        };
        lock(&self.entries).insert(key, entry);
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid_at(now));
        before - entries.len()
    }
}

/// Key-value cache with per-entry expiry. Clones share the same storage.
pub struct TtlCache<V> {
    pub(super) inner: Arc<Inner<V>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                clock,
            }),
        }
    }

    /// Cached value for `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key)
    }

    /// Store `value`, replacing any existing entry and restarting its TTL.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.inner.set(key.into(), value, ttl);
    }

    pub fn remove(&self, key: &str) -> bool {
        lock(&self.inner.entries).remove(key).is_some()
    }

    pub fn clear(&self) {
        lock(&self.inner.entries).clear();
    }

    /// Drop every entry whose key matches `pattern`. Returns how many went.
    pub fn invalidate_matching(&self, pattern: &Regex) -> usize {
        let mut entries = lock(&self.inner.entries);
        let before = entries.len();
        entries.retain(|key, _| !pattern.is_match(key));
        before - entries.len()
    }

    /// Evict all expired entries. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `sweep` every `interval` until the cache is dropped or the task is
    /// aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let clock = Arc::clone(&self.inner.clock);
        tokio::spawn(async move {
            loop {
                clock.sleep(interval).await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let evicted = inner.sweep();
                if evicted > 0 {
                    debug!(evicted, "cache sweep");
                }
            }
        })
    }
}
