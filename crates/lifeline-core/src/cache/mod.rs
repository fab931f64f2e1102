//! Process-wide time-boxed cache.
//!
//! Entries carry their own TTL and are valid while `now - recorded_at < ttl`.
//! Expired entries read as misses and are dropped on access or by the
//! background sweeper. `get_or_fetch` adds request coalescing: concurrent
//! callers for a key share one in-flight fetch.

mod coalesce;
mod ttl;

pub use coalesce::SharedError;
pub use ttl::{CacheEntry, TtlCache, DEFAULT_TTL, SWEEP_INTERVAL};
