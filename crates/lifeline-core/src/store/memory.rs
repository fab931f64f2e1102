use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{merge_documents, validate_id, DocumentStore, StoreConnector};
use crate::error::StoreError;

/// Process-local store; contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<(String, String), Value>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Connection("store is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn documents(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), Value>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn key(collection: &str, id: &str) -> Result<(String, String), StoreError> {
    validate_id(collection)?;
    validate_id(id)?;
    Ok((collection.to_string(), id.to_string()))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        let key = key(collection, id)?;
        Ok(self.documents().get(&key).cloned())
    }

    async fn insert(&self, collection: &str, id: &str, document: Value) -> Result<Value, StoreError> {
        self.ensure_open()?;
        let key = key(collection, id)?;
        let mut documents = self.documents();
        if documents.contains_key(&key) {
            return Err(StoreError::DuplicateKey(format!("{}/{}", collection, id)));
        }
        documents.insert(key, document.clone());
        Ok(document)
    }

    async fn upsert(&self, collection: &str, id: &str, document: Value) -> Result<Value, StoreError> {
        self.ensure_open()?;
        let key = key(collection, id)?;
        let mut documents = self.documents();
        let merged = match documents.remove(&key) {
            Some(existing) => merge_documents(existing, document),
            None => document,
        };
        documents.insert(key, merged.clone());
        Ok(merged)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let key = key(collection, id)?;
        Ok(self.documents().remove(&key).is_some())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one shared `MemoryStore`, so a reconnect sees earlier writes.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        if self.store.is_closed() {
            // Reopen after a shutdown/reconnect cycle
            self.store.closed.store(false, Ordering::SeqCst);
        }
        Ok(self.store.clone())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
