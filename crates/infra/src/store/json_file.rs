use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use super::r#trait::{Store, StoreError};

/// One JSON array file per collection under a root directory.
///
/// Writes go to a temporary sibling file and are renamed into place, so a crash
/// mid-write leaves the previous collection intact.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    io: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            io: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, collection: &str) -> Result<PathBuf, StoreError> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }
        Ok(self.root.join(format!("{collection}.json")))
    }
}

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Io(e.to_string())
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get(&self, collection: &str) -> Result<Vec<JsonValue>, StoreError> {
        let path = self.path_for(collection)?;
        let _guard = self.io.lock().await;

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
            collection: collection.to_string(),
            message: e.to_string(),
        })
    }

    async fn put(&self, collection: &str, records: Vec<JsonValue>) -> Result<(), StoreError> {
        let path = self.path_for(collection)?;
        let body = serde_json::to_vec_pretty(&records).map_err(|e| StoreError::Malformed {
            collection: collection.to_string(),
            message: e.to_string(),
        })?;

        let _guard = self.io.lock().await;
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_collection_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.get("orders").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![json!({"id": "A", "price": 1800})];

        JsonFileStore::new(dir.path())
            .put("inventory", records.clone())
            .await
            .unwrap();

        let reopened = JsonFileStore::new(dir.path());
        assert_eq!(reopened.get("inventory").await.unwrap(), records);
        assert!(!dir.path().join("inventory.json.tmp").exists());
    }

    #[tokio::test]
    async fn rejects_path_like_collection_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(
            store.get("../etc").await,
            Err(StoreError::InvalidCollection(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("orders.json"), b"{not json").unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(
            store.get("orders").await,
            Err(StoreError::Malformed { .. })
        ));
    }
}
