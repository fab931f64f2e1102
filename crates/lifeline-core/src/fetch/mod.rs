//! Client-side retrying fetcher.
//!
//! `Fetcher::safe_fetch` wraps every outbound HTTP call in a per-attempt
//! timeout and exponential backoff (`2^attempt` seconds between attempts) and
//! always resolves to a `FetchResponse` envelope. Only transport failures
//! (timeouts, refused connections) are retried; any completed HTTP exchange,
//! including 4xx/5xx, is returned as-is.
//!
//! The HTTP layer sits behind the `Transport` trait so the retry loop can be
//! driven by scripted transports in tests; `ReqwestTransport` is the real one.

pub mod client;
pub mod envelope;
pub mod error;
pub mod transport;

pub use client::{normalize_api_host, FetchOptions, Fetcher, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
pub use envelope::{FetchResponse, DEMO_MESSAGE};
pub use error::FetchError;
pub use transport::{RawResponse, ReqwestTransport, RequestDescriptor, Transport};
