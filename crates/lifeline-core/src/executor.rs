//! Fallback-wrapped store operations.
//!
//! Reads never fail: demo mode short-circuits to the caller's fallback, and
//! any error from the store is logged and replaced by the fallback. Writes
//! are asymmetric: they are simulated in demo mode but otherwise propagate
//! their errors so callers can report them.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::cache::{TtlCache, DEFAULT_TTL};
use crate::connection::ConnectionManager;
use crate::error::StoreError;
use crate::store::DocumentStore;

/// Cached query results are stored type-erased and handed back as the
/// same value the query produced.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Result of a masked read: either what the store returned or the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Live(T),
    Degraded(T),
}

impl<T> Outcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Live(value) | Outcome::Degraded(value) => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }
}

/// Result of a write that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    Stored(T),
    /// Demo mode: nothing was written; `data` echoes the submitted value.
    Simulated { message: String, data: T },
}

impl<T> WriteOutcome<T> {
    fn simulated(name: &str, data: T) -> Self {
        WriteOutcome::Simulated {
            message: format!("{name} saved successfully (demo mode)"),
            data,
        }
    }

    pub fn data(&self) -> &T {
        match self {
            WriteOutcome::Stored(data) | WriteOutcome::Simulated { data, .. } => data,
        }
    }

    pub fn into_data(self) -> T {
        match self {
            WriteOutcome::Stored(data) | WriteOutcome::Simulated { data, .. } => data,
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, WriteOutcome::Simulated { .. })
    }
}

#[derive(Clone)]
pub struct Executor {
    connection: Arc<ConnectionManager>,
    cache: TtlCache<CachedValue>,
    default_ttl: Duration,
}

impl Executor {
    pub fn new(connection: Arc<ConnectionManager>, cache: TtlCache<CachedValue>) -> Self {
        Self {
            connection,
            cache,
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn cache(&self) -> &TtlCache<CachedValue> {
        &self.cache
    }

    pub fn is_demo_mode(&self) -> bool {
        self.connection.is_demo_mode()
    }

    async fn call<T, F, Fut>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnOnce(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let store = self
            .connection
            .store()
            .ok_or_else(|| StoreError::Connection("store is not connected".to_string()))?;
        operation(store).await
    }

    /// Run `operation`, or return `fallback` in demo mode or on any failure.
    pub async fn execute_with_fallback<T, F, Fut>(&self, name: &str, operation: F, fallback: T) -> T
    where
        F: FnOnce(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.run_with_fallback(name, operation, fallback)
            .await
            .into_inner()
    }

    /// Like `execute_with_fallback`, but reports whether the fallback was used.
    pub async fn run_with_fallback<T, F, Fut>(
        &self,
        name: &str,
        operation: F,
        fallback: T,
    ) -> Outcome<T>
    where
        F: FnOnce(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if self.is_demo_mode() {
            debug!(operation = %name, "Demo mode: serving fallback data");
            return Outcome::Degraded(fallback);
        }

        match self.call(operation).await {
            Ok(value) => Outcome::Live(value),
            Err(e) => {
                warn!(operation = %name, error = %e, "Store operation failed, serving fallback data");
                Outcome::Degraded(fallback)
            }
        }
    }

    /// Read-through cached query. Concurrent misses on the same key share one
    /// query. Fallbacks are never cached.
    pub async fn get_data_with_cache<T, F, Fut>(
        &self,
        query: F,
        fallback: T,
        cache_key: Option<&str>,
        ttl: Option<Duration>,
    ) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let name = cache_key.unwrap_or("query");
        if self.is_demo_mode() {
            debug!(operation = %name, "Demo mode: serving fallback data");
            return fallback;
        }

        let Some(key) = cache_key else {
            return self.uncached(name, query, fallback).await;
        };

        if let Some(cached) = self.cache.get(key) {
            match cached.downcast::<T>() {
                Ok(value) => {
                    debug!(key, "cache hit");
                    return T::clone(&value);
                }
                Err(_) => {
                    warn!(key, "Cached value has a different type, ignoring it");
                    return self.uncached(name, query, fallback).await;
                }
            }
        }

        let Some(store) = self.connection.store() else {
            warn!(operation = %name, "Store is not connected, serving fallback data");
            return fallback;
        };
        let request = query(store);
        let result = self
            .cache
            .get_or_fetch(
                key,
                ttl.unwrap_or(self.default_ttl),
                move || async move { request.await.map(|value| Arc::new(value) as CachedValue) },
                |_| true,
            )
            .await;

        match result.map(|cached| cached.downcast::<T>()) {
            Ok(Ok(value)) => T::clone(&value),
            Ok(Err(_)) => {
                warn!(key, "Shared query produced a different type, serving fallback data");
                fallback
            }
            Err(e) => {
                warn!(operation = %name, error = %e, "Query failed, serving fallback data");
                fallback
            }
        }
    }

    async fn uncached<T, F, Fut>(&self, name: &str, query: F, fallback: T) -> T
    where
        F: FnOnce(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match self.call(query).await {
            Ok(value) => value,
            Err(e) => {
                warn!(operation = %name, error = %e, "Query failed, serving fallback data");
                fallback
            }
        }
    }

    /// Run a write. Demo mode (including demo mode entered while the write
    /// was failing) yields a simulated success echoing `data`; any other
    /// failure is returned to the caller.
    pub async fn save_data_with_queue<T, F, Fut>(
        &self,
        name: &str,
        operation: F,
        data: T,
    ) -> Result<WriteOutcome<T>, StoreError>
    where
        F: FnOnce(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if self.is_demo_mode() {
            debug!(operation = %name, "Demo mode: simulating write");
            return Ok(WriteOutcome::simulated(name, data));
        }

        match self.call(operation).await {
            Ok(stored) => Ok(WriteOutcome::Stored(stored)),
            Err(e) if self.is_demo_mode() => {
                warn!(operation = %name, error = %e, "Write failed after entering demo mode, simulating");
                Ok(WriteOutcome::simulated(name, data))
            }
            Err(e) => {
                error!(operation = %name, error = %e, "Write failed");
                Err(e)
            }
        }
    }

    /// Drop a cached query result.
    pub fn invalidate(&self, cache_key: &str) -> bool {
        self.cache.remove(cache_key)
    }
}
