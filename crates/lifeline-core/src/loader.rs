//! Load-with-fallback helper.
//!
//! `DataLoader` runs a fallible load and substitutes fallback data when it
//! fails. The caller gets the outcome of the first attempt right away; when
//! retry is enabled, a bounded number of retries run on a background task
//! and publish their outcome through a `watch` channel.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::clock::Clock;

/// Delay between retries when none is configured.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5_000);

/// Retries after the initial load.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<T> {
    Ready(T),
    /// The load failed and fallback data is shown in its place.
    Fallback { data: T, error: String },
    /// The load failed and there was nothing to fall back to.
    Failed { error: String },
}

impl<T> LoadState<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Ready(data) | LoadState::Fallback { data, .. } => Some(data),
            LoadState::Failed { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            LoadState::Ready(data) | LoadState::Fallback { data, .. } => Some(data),
            LoadState::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Ready(_) => None,
            LoadState::Fallback { error, .. } | LoadState::Failed { error } => Some(error),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }

    fn failed(fallback: Option<T>, error: String) -> Self {
        match fallback {
            Some(data) => {
                debug!(error = %error, "Load failed, using fallback data");
                LoadState::Fallback { data, error }
            }
            None => {
                warn!(error = %error, "Load failed with no fallback data");
                LoadState::Failed { error }
            }
        }
    }
}

/// Handle on a load. Holds the latest state and sees background retries
/// as they finish.
#[derive(Debug)]
pub struct Loaded<T> {
    rx: watch::Receiver<LoadState<T>>,
}

impl<T: Clone> Loaded<T> {
    /// State as of now.
    pub fn current(&self) -> LoadState<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next state published by a retry. `None` once retries
    /// are over.
    pub async fn changed(&mut self) -> Option<LoadState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }

    /// Wait until retries are over and return the final state.
    pub async fn settled(mut self) -> LoadState<T> {
        while self.rx.changed().await.is_ok() {}
        self.current()
    }
}

pub struct DataLoader {
    clock: Arc<dyn Clock>,
    retry_on_error: bool,
    retry_delay: Duration,
    max_retries: u32,
}

impl DataLoader {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            retry_on_error: false,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: MAX_RETRIES,
        }
    }

    pub fn retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error = retry;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run `fetch` once and return as soon as it finishes. A failure is
    /// reported alongside `fallback`, or as `Failed` when there is no
    /// fallback. With retry enabled, failed loads are retried on a spawned
    /// task until one succeeds or the retries run out, whether or not the
    /// handle is still held.
    pub async fn load<T, E, F, Fut>(&self, mut fetch: F, fallback: Option<T>) -> Loaded<T>
    where
        T: Clone + Send + Sync + 'static,
        E: Display + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let first = match fetch().await {
            Ok(data) => LoadState::Ready(data),
            Err(e) => LoadState::failed(fallback.clone(), e.to_string()),
        };
        let retry = self.retry_on_error && self.max_retries > 0 && !first.is_ready();
        let (tx, rx) = watch::channel(first);

        if retry {
            let clock = Arc::clone(&self.clock);
            let delay = self.retry_delay;
            let max_retries = self.max_retries;
            tokio::spawn(async move {
                for retry in 1..=max_retries {
                    warn!(retry, delay_ms = delay.as_millis() as u64, "Load failed, retrying");
                    clock.sleep(delay).await;
                    let state = match fetch().await {
                        Ok(data) => LoadState::Ready(data),
                        Err(e) => LoadState::failed(fallback.clone(), e.to_string()),
                    };
                    let ready = state.is_ready();
                    tx.send_replace(state);
                    if ready {
                        debug!(retry, "Load recovered");
                        return;
                    }
                }
            });
        }

        Loaded { rx }
    }
}
