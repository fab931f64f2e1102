//! Store connection supervision.
//!
//! `ConnectionManager` owns the one long-lived store connection. It retries
//! failed connects with exponential backoff (`2^attempt` seconds, no jitter)
//! and, once `max_attempts` consecutive attempts have failed, switches the
//! process into demo mode for good. Demo mode can also be set up front from
//! configuration.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::store::{DocumentStore, StoreConnector};

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub max_attempts: u32,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Delay before reconnecting after a disconnect event.
    pub reconnect_delay: Duration,
    /// Upper bound on closing the store at shutdown.
    pub close_timeout: Duration,
    /// Backoff unit; the delay after attempt `n` is `base_backoff * 2^n`.
    pub base_backoff: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
            close_timeout: Duration::from_secs(5),
            base_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    DemoMode,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::DemoMode => "demo mode",
        };
        f.write_str(label)
    }
}

/// Events reported by a store driver after the connection is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Error(String),
    Disconnected,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct ConnectionManager {
    connector: Arc<dyn StoreConnector>,
    settings: ConnectionSettings,
    clock: Arc<dyn Clock>,
    demo_mode: AtomicBool,
    attempts: AtomicU32,
    state: Mutex<ConnectionState>,
    store: Mutex<Option<Arc<dyn DocumentStore>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        settings: ConnectionSettings,
        clock: Arc<dyn Clock>,
        demo_mode: bool,
    ) -> Self {
        let state = if demo_mode {
            ConnectionState::DemoMode
        } else {
            ConnectionState::Connecting
        };
        Self {
            connector,
            settings,
            clock,
            demo_mode: AtomicBool::new(demo_mode),
            attempts: AtomicU32::new(0),
            state: Mutex::new(state),
            store: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn is_demo_mode(&self) -> bool {
        self.demo_mode.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_demo_mode() {
            ConnectionState::DemoMode
        } else {
            *lock(&self.state)
        }
    }

    /// Consecutive failed attempts since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn describe_target(&self) -> String {
        self.connector.describe()
    }

    /// The live store, if connected.
    pub fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        lock(&self.store).clone()
    }

    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    /// Switch to demo mode for the rest of the process lifetime.
    pub fn enable_demo_mode(&self, reason: &str) {
        if !self.demo_mode.swap(true, Ordering::SeqCst) {
            warn!(reason, "Enabling demo mode");
        }
        self.set_state(ConnectionState::DemoMode);
    }

    /// Make one connection attempt. Does nothing in demo mode.
    pub async fn connect(&self) -> Result<(), StoreError> {
        if self.is_demo_mode() {
            debug!("Demo mode: skipping store connection");
            return Ok(());
        }

        let max = self.settings.max_attempts;
        if self.attempts() >= max {
            self.enable_demo_mode("maximum connection attempts reached");
            return Err(StoreError::Connection(
                "maximum connection attempts reached".to_string(),
            ));
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Connecting);
        info!(
            attempt,
            max,
            store = %self.connector.describe(),
            "Connecting to store"
        );

        let result = match tokio::time::timeout(self.settings.connect_timeout, self.connector.connect()).await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.settings.connect_timeout)),
        };

        match result {
            Ok(store) => {
                *lock(&self.store) = Some(store);
                self.attempts.store(0, Ordering::SeqCst);
                self.set_state(ConnectionState::Connected);
                info!("Connected to store");
                Ok(())
            }
            Err(e) => {
                warn!(attempt, error = %e, "Store connection attempt failed");
                self.set_state(ConnectionState::Disconnected);
                if attempt >= max {
                    self.enable_demo_mode("persistent connection failures");
                }
                Err(e)
            }
        }
    }

    /// Delay before the next attempt, given `attempts` failures so far.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        self.settings.base_backoff * 2u32.saturating_pow(attempts)
    }

    /// Connect, retrying with backoff until connected or in demo mode.
    pub async fn supervise(&self) {
        loop {
            match self.connect().await {
                Ok(()) => return,
                Err(_) if self.is_demo_mode() => return,
                Err(_) => {
                    let delay = self.backoff_delay(self.attempts());
                    info!(delay_secs = delay.as_secs_f64(), "Retrying store connection");
                    self.clock.sleep(delay).await;
                }
            }
        }
    }

    /// Feed a driver event into the state machine.
    pub fn on_event(self: &Arc<Self>, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                if !self.is_demo_mode() {
                    info!("Store connection established");
                    self.set_state(ConnectionState::Connected);
                }
            }
            ConnectionEvent::Error(message) => {
                warn!(error = %message, "Store connection error");
                if !self.is_demo_mode() {
                    self.set_state(ConnectionState::Disconnected);
                }
            }
            ConnectionEvent::Disconnected => {
                warn!("Store disconnected");
                lock(&self.store).take();
                if self.is_demo_mode() {
                    return;
                }
                self.set_state(ConnectionState::Disconnected);
                if self.attempts() < self.settings.max_attempts {
                    let this = Arc::clone(self);
                    let delay = self.settings.reconnect_delay;
                    info!(delay_secs = delay.as_secs_f64(), "Attempting to reconnect");
                    let handle = tokio::spawn(async move {
                        this.clock.sleep(delay).await;
                        this.supervise().await;
                    });
                    lock(&self.tasks).push(handle);
                }
            }
        }
    }

    /// Stop supervision and close the store. Close is bounded by
    /// `close_timeout`; failures are logged, never returned.
    pub async fn shutdown(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }

        let store = lock(&self.store).take();
        if let Some(store) = store {
            info!("Closing store connection");
            match tokio::time::timeout(self.settings.close_timeout, store.close()).await {
                Ok(Ok(())) => info!("Store connection closed"),
                Ok(Err(e)) => error!(error = %e, "Error closing store connection"),
                Err(_) => error!(
                    timeout_secs = self.settings.close_timeout.as_secs_f64(),
                    "Timed out closing store connection"
                ),
            }
        }

        if !self.is_demo_mode() {
            self.set_state(ConnectionState::Disconnected);
        }
    }
}
