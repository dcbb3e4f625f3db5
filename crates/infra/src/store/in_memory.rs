use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::r#trait::{Store, StoreError};

/// In-memory collection store.
///
/// Intended for tests/dev. Counts writes per collection and can be switched
/// offline to exercise failure paths.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<JsonValue>>>,
    writes: RwLock<HashMap<String, usize>>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection without counting it as a write.
    pub fn seed(&self, collection: &str, records: Vec<JsonValue>) {
        if let Ok(mut map) = self.collections.write() {
            map.insert(collection.to_string(), records);
        }
    }

    /// Number of `put` calls that reached `collection`.
    pub fn write_count(&self, collection: &str) -> usize {
        self.writes
            .read()
            .map(|w| w.get(collection).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, collection: &str) -> Result<Vec<JsonValue>, StoreError> {
        self.ensure_online()?;
        let map = self
            .collections
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(map.get(collection).cloned().unwrap_or_default())
    }

    async fn put(&self, collection: &str, records: Vec<JsonValue>) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut map = self
                .collections
                .write()
                .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
            map.insert(collection.to_string(), records);
        }
        if let Ok(mut writes) = self.writes.write() {
            *writes.entry(collection.to_string()).or_default() += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_replaces_collection_and_counts_writes() {
        let store = InMemoryStore::new();
        store.put("orders", vec![json!({"id": 1})]).await.unwrap();
        store.put("orders", vec![json!({"id": 2})]).await.unwrap();

        assert_eq!(store.get("orders").await.unwrap(), vec![json!({"id": 2})]);
        assert_eq!(store.write_count("orders"), 2);
        assert!(store.get("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_store_rejects_calls() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.get("orders").await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
