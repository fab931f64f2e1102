use std::time::Duration;

use thiserror::Error;

/// Failures from the backing document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid resource id: {0}")]
    InvalidId(String),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(vec![message.into()])
    }

    /// True for failures that mean the store itself is unreachable, as opposed
    /// to a single operation being rejected.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Query(format!("malformed document: {}", err))
    }
}
