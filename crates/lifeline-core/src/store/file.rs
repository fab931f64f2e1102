//! File-backed document store.
//!
//! Each document lives at `<root>/<collection>/<id>.json`, wrapped with the
//! time it was last written. Writes go to `<id>.json.tmp` first and are
//! renamed into place, so a reader never sees a half-written document.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{merge_documents, validate_id, DocumentStore, StoreConnector};
use crate::error::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    data: Value,
    updated_at: DateTime<Utc>,
}

impl StoredDocument {
    fn new(data: Value) -> Self {
        Self {
            data,
            updated_at: Utc::now(),
        }
    }
}

pub struct FileStore {
    root: PathBuf,
    closed: AtomicBool,
    /// Held across every read-modify-write so concurrent writers don't
    /// lose each other's fields.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            closed: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Connection("store is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, StoreError> {
        validate_id(collection)?;
        Ok(self.root.join(collection))
    }

    fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.collection_dir(collection)?.join(format!("{}.json", id)))
    }

    async fn load(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let path = self.document_path(collection, id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, collection: &str, id: &str, data: Value) -> Result<Value, StoreError> {
        let path = self.document_path(collection, id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let stored = StoredDocument::new(data);
        let contents = serde_json::to_string_pretty(&stored)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, contents).await?;
        tokio::fs::rename(&staging, &path).await?;
        debug!(collection, id, "document written");
        Ok(stored.data)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        Ok(self.load(collection, id).await?.map(|doc| doc.data))
    }

    async fn insert(&self, collection: &str, id: &str, document: Value) -> Result<Value, StoreError> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;
        if self.load(collection, id).await?.is_some() {
            return Err(StoreError::DuplicateKey(format!("{}/{}", collection, id)));
        }
        self.save(collection, id, document).await
    }

    async fn upsert(&self, collection: &str, id: &str, document: Value) -> Result<Value, StoreError> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;
        let merged = match self.load(collection, id).await? {
            Some(existing) => merge_documents(existing.data, document),
            None => document,
        };
        self.save(collection, id, merged).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let path = self.document_path(collection, id)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens a `FileStore`, creating the root directory if needed.
#[derive(Debug, Clone)]
pub struct FileConnector {
    root: PathBuf,
}

impl FileConnector {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl StoreConnector for FileConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            StoreError::Connection(format!(
                "cannot open store at {}: {}",
                self.root.display(),
                e
            ))
        })?;
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        if metadata.permissions().readonly() {
            return Err(StoreError::Connection(format!(
                "store at {} is read-only",
                self.root.display()
            )));
        }
        Ok(Arc::new(FileStore::new(self.root.clone())))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn open_store(dir: &tempfile::TempDir) -> Arc<dyn DocumentStore> {
        FileConnector::new(dir.path().join("store"))
            .connect()
            .await
            .ok()
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .upsert("cta", "main-cta", json!({"id": "main-cta", "title": "Give"}))
            .await
            .unwrap();
        store
            .upsert("cta", "main-cta", json!({"title": "Donate"}))
            .await
            .unwrap();

        let found = store.find_one("cta", "main-cta").await.unwrap();
        assert_eq!(found, Some(json!({"id": "main-cta", "title": "Donate"})));
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert_eq!(store.find_one("cta", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_duplicate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.insert("team", "1", json!({"name": "A"})).await.unwrap();
        let err = store.insert("team", "1", json!({"name": "B"})).await;
        assert_eq!(err, Err(StoreError::DuplicateKey("team/1".into())));
    }

    #[tokio::test]
    async fn test_write_replaces_file_via_staging_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let collection = dir.path().join("store").join("cta");

        // Leftover from an interrupted write
        std::fs::create_dir_all(&collection).unwrap();
        std::fs::write(collection.join("main-cta.json.tmp"), "{\"data\": {\"tit").unwrap();

        store
            .upsert("cta", "main-cta", json!({"title": "Give"}))
            .await
            .unwrap();

        assert_eq!(
            store.find_one("cta", "main-cta").await.unwrap(),
            Some(json!({"title": "Give"}))
        );
        let names: Vec<String> = std::fs::read_dir(&collection)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["main-cta.json".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_keep_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let writes = (0..16).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .upsert("about_team", "main", json!({ format!("field{i}"): i }))
                    .await
            })
        });
        for write in futures::future::join_all(writes).await {
            write.unwrap().unwrap();
        }

        let document = store.find_one("about_team", "main").await.unwrap().unwrap();
        let fields = document.as_object().unwrap();
        assert_eq!(fields.len(), 16);
        assert_eq!(fields["field7"], json!(7));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.insert("team", "a", json!({})).await.unwrap();
        assert!(store.delete("team", "a").await.unwrap());
        assert!(!store.delete("team", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let err = store.find_one("cta", "../../secret").await;
        assert_eq!(err, Err(StoreError::InvalidId("../../secret".into())));
    }

    #[tokio::test]
    async fn test_closed_store_refuses_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.close().await.unwrap();
        let err = store.find_one("cta", "main-cta").await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn test_connect_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let connector = FileConnector::new(blocker.join("store"));
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, StoreError::Connection(_)));
    }
}
