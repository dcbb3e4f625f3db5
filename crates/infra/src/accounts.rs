//! Seller/buyer account directory and engine settings, read from the store.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stockhold_core::AccountId;

use crate::store::{Store, StoreError, collections, load};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Seller,
    Buyer,
}

/// Opaque upstream session token. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// Upstream shipping address reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub role: AccountRole,
    pub credentials: Credentials,
    /// When set, address resolution skips the upstream lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_address: Option<ShippingAddress>,
}

/// Read-only view over the `accounts` collection.
///
/// Every lookup re-reads the store so edits made by the operator apply to the
/// next reservation without a restart.
#[derive(Clone)]
pub struct AccountDirectory {
    store: Arc<dyn Store>,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn all(&self) -> Result<Vec<Account>, StoreError> {
        load(&*self.store, collections::ACCOUNTS).await
    }

    pub async fn seller(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        self.find(id, AccountRole::Seller).await
    }

    pub async fn buyer(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        self.find(id, AccountRole::Buyer).await
    }

    pub async fn buyers(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|a| a.role == AccountRole::Buyer)
            .collect())
    }

    async fn find(&self, id: &AccountId, role: AccountRole) -> Result<Option<Account>, StoreError> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .find(|a| &a.id == id && a.role == role))
    }
}

/// Operator-editable engine settings (`settings` collection, first record).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_secs: Option<u64>,
}

impl Settings {
    pub async fn load(store: &dyn Store) -> Result<Self, StoreError> {
        let records: Vec<Settings> = load(store, collections::SETTINGS).await?;
        Ok(records.into_iter().next().unwrap_or_default())
    }

    /// Order validity window, falling back to `default` when unset or zero.
    pub fn validity_or(&self, default: Duration) -> Duration {
        match self.validity_secs {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => default,
        }
    }
}
