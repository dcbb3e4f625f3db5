use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Collection names used by the engine.
pub mod collections {
    pub const INVENTORY: &str = "inventory";
    pub const ORDERS: &str = "orders";
    pub const ACCOUNTS: &str = "accounts";
    pub const SETTINGS: &str = "settings";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("malformed record in '{collection}': {message}")]
    Malformed { collection: String, message: String },

    #[error("invalid collection name '{0}'")]
    InvalidCollection(String),
}

/// Persisted collections of JSON records.
///
/// `put` replaces the whole collection. No transactional guarantees are assumed
/// beyond last-write-wins.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: &str) -> Result<Vec<JsonValue>, StoreError>;

    async fn put(&self, collection: &str, records: Vec<JsonValue>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn get(&self, collection: &str) -> Result<Vec<JsonValue>, StoreError> {
        (**self).get(collection).await
    }

    async fn put(&self, collection: &str, records: Vec<JsonValue>) -> Result<(), StoreError> {
        (**self).put(collection, records).await
    }
}

/// Load and decode a whole collection.
///
/// A single malformed record fails the load: callers write collections back
/// wholesale, and silently skipping a record would drop it on the next write.
pub async fn load<T>(store: &dyn Store, collection: &str) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
{
    store
        .get(collection)
        .await?
        .into_iter()
        .map(|raw| {
            serde_json::from_value(raw).map_err(|e| StoreError::Malformed {
                collection: collection.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Encode and replace a whole collection.
pub async fn save<T>(store: &dyn Store, collection: &str, records: &[T]) -> Result<(), StoreError>
where
    T: Serialize,
{
    let encoded = records
        .iter()
        .map(|r| {
            serde_json::to_value(r).map_err(|e| StoreError::Malformed {
                collection: collection.to_string(),
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    store.put(collection, encoded).await
}
