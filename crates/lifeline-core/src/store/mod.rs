//! Backing document store.
//!
//! Documents are JSON objects addressed by (collection, id). The connection
//! manager obtains a live `DocumentStore` from a `StoreConnector`; which
//! connector is used is decided by the scheme of the configured store URL:
//!
//! - `file://<dir>`: one JSON file per document under `<dir>`
//! - `memory://`: process-local, lost on exit
//!
//! Any other scheme (including the default `mongodb://`) has no driver
//! and fails every connection attempt, which drives the manager into demo
//! mode exactly as an unreachable database would.

pub mod file;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

pub use file::{FileConnector, FileStore};
pub use memory::{MemoryConnector, MemoryStore};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Insert a new document. Fails with `DuplicateKey` if the id is taken.
    async fn insert(&self, collection: &str, id: &str, document: Value)
        -> Result<Value, StoreError>;

    /// Merge `document` into the stored one (top-level fields overwrite),
    /// creating it if absent. Returns the stored result.
    async fn upsert(&self, collection: &str, id: &str, document: Value)
        -> Result<Value, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError>;

    /// Target description for logs; never includes credentials.
    fn describe(&self) -> String;
}

/// Connector for a scheme we have no driver for.
#[derive(Debug, Clone)]
pub struct UnsupportedConnector {
    scheme: String,
}

#[async_trait]
impl StoreConnector for UnsupportedConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        Err(StoreError::Connection(format!(
            "no driver for '{}' store URLs",
            self.scheme
        )))
    }

    fn describe(&self) -> String {
        format!("{}://<unsupported>", self.scheme)
    }
}

/// Pick a connector for a store URL.
pub fn connector_for_url(url: &str) -> Arc<dyn StoreConnector> {
    let url = url.trim();
    match url.split_once("://") {
        Some(("file", path)) => Arc::new(FileConnector::new(PathBuf::from(path))),
        Some(("memory", _)) => Arc::new(MemoryConnector::new()),
        Some((scheme, _)) => Arc::new(UnsupportedConnector {
            scheme: scheme.to_lowercase(),
        }),
        // A bare path is a file store
        None => Arc::new(FileConnector::new(PathBuf::from(url))),
    }
}

/// Ids become file names, so keep them to a safe alphabet.
pub(crate) fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

/// Shallow merge of `update` into `existing`; non-object updates replace.
pub(crate) fn merge_documents(existing: Value, update: Value) -> Value {
    match (existing, update) {
        (Value::Object(mut base), Value::Object(fields)) => {
            for (k, v) in fields {
                base.insert(k, v);
            }
            Value::Object(base)
        }
        (_, update) => update,
    }
}
