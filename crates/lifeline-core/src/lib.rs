//! Lifeline - a degrade-gracefully data-access layer.
//!
//! This crate sits between application logic and an unreliable backing
//! store (a document store plus an HTTP API) and keeps the application
//! serving content when either is slow or unavailable:
//!
//! - `connection`: supervises the store connection and decides when to give
//!   up and switch to demo mode
//! - `executor`: wraps store reads/writes with demo-mode short-circuiting and
//!   fallback substitution
//! - `cache`: process-wide time-boxed cache with request coalescing
//! - `fetch`: outbound HTTP with timeouts, exponential backoff and a uniform
//!   result envelope
//! - `loader`: load-with-fallback helper with bounded background retry
//! - `content`: typed site content sections and the operations serving them
//!
//! `Lifeline` in `context` wires all of the above from a `Config`.

pub mod cache;
pub mod clock;
pub mod config;
pub mod connection;
pub mod content;
pub mod context;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod loader;
pub mod response;
pub mod store;

pub use cache::TtlCache;
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::Config;
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionSettings, ConnectionState};
pub use context::Lifeline;
pub use error::StoreError;
pub use executor::{Executor, Outcome, WriteOutcome};
pub use fetch::{FetchError, FetchOptions, FetchResponse, Fetcher};
pub use loader::{DataLoader, LoadState, Loaded};
pub use store::{DocumentStore, StoreConnector};
