//! Authoritative in-memory cache of inventory occupancy and lock tickets.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use stockhold_core::ItemId;
use stockhold_inventory::{CatalogEntry, InventoryItem, Occupancy};

use crate::store::{Store, collections, load, save};

use super::error::EngineError;

/// Counts from one catalog merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSyncReport {
    pub added: usize,
    pub updated: usize,
    pub sold: usize,
}

/// Lock ticket store.
///
/// Every occupancy/ticket change runs inside [`InventoryLedger::mutate`], which
/// holds one async mutex across the edit and the persist. Edits are applied to
/// a copy and only installed once the store accepted them.
pub struct InventoryLedger {
    store: Arc<dyn Store>,
    items: Mutex<BTreeMap<ItemId, InventoryItem>>,
}

impl InventoryLedger {
    pub async fn load(store: Arc<dyn Store>) -> Result<Self, EngineError> {
        let items = read_items(&*store).await?;
        Ok(Self {
            store,
            items: Mutex::new(items),
        })
    }

    /// Replace the cache with the store's current contents.
    pub async fn reload(&self) -> Result<usize, EngineError> {
        let mut guard = self.items.lock().await;
        *guard = read_items(&*self.store).await?;
        Ok(guard.len())
    }

    pub async fn snapshot(&self) -> Vec<InventoryItem> {
        self.items.lock().await.values().cloned().collect()
    }

    pub async fn get(&self, id: &ItemId) -> Option<InventoryItem> {
        self.items.lock().await.get(id).cloned()
    }

    /// Run `f` against the item map as one critical section.
    ///
    /// The store is written only if `f` succeeded and changed something. On a
    /// failed write the cache keeps its previous state.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut BTreeMap<ItemId, InventoryItem>) -> Result<T, EngineError>,
    {
        let mut guard = self.items.lock().await;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;

        if draft != *guard {
            let records: Vec<&InventoryItem> = draft.values().collect();
            if let Err(e) = save(&*self.store, collections::INVENTORY, &records).await {
                tracing::warn!(error = %e, "inventory write failed; lock change rolled back");
                return Err(e.into());
            }
            *guard = draft;
        }
        Ok(out)
    }

    /// Merge upstream catalog entries.
    ///
    /// Known items keep their lock state (a sold listing still moves them to
    /// `sold`); unknown items are added idle.
    pub async fn sync_catalog(&self, entries: Vec<CatalogEntry>) -> Result<CatalogSyncReport, EngineError> {
        let report = self
            .mutate(|items| {
                let mut report = CatalogSyncReport::default();
                for entry in entries {
                    match items.get_mut(&entry.id) {
                        Some(item) => {
                            let before = item.clone();
                            item.apply_catalog(&entry);
                            if *item != before {
                                report.updated += 1;
                                if item.occupancy() == Occupancy::Sold
                                    && before.occupancy() != Occupancy::Sold
                                {
                                    report.sold += 1;
                                }
                            }
                        }
                        None => {
                            items.insert(entry.id.clone(), InventoryItem::from_catalog(entry));
                            report.added += 1;
                        }
                    }
                }
                Ok(report)
            })
            .await?;

        tracing::info!(
            added = report.added,
            updated = report.updated,
            sold = report.sold,
            "catalog synced"
        );
        Ok(report)
    }
}

async fn read_items(store: &dyn Store) -> Result<BTreeMap<ItemId, InventoryItem>, EngineError> {
    let records: Vec<InventoryItem> = load(store, collections::INVENTORY).await?;
    Ok(records
        .into_iter()
        .map(|item| (item.id_typed().clone(), item))
        .collect())
}
