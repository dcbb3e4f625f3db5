use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockhold_core::{AccountId, Entity, ItemId, LockTicket, Money};

/// Occupancy of an inventory item from the engine's point of view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occupancy {
    Idle,
    Occupied,
    Sold,
}

/// Listing status reported by the upstream catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    OnSale,
    OffShelf,
    Sold,
}

/// Lock transition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The presented ticket is not the item's current ticket.
    #[error("stale lock ticket for item {item}")]
    StaleTicket {
        item: ItemId,
        presented: LockTicket,
        current: Option<LockTicket>,
    },

    /// The item is already held by a reservation.
    #[error("item {0} is already occupied")]
    AlreadyOccupied(ItemId),

    /// The item is not currently listed as sellable.
    #[error("item {0} is not listed for sale")]
    NotListed(ItemId),

    /// Sold items never return to the pool.
    #[error("item {0} is sold")]
    Sold(ItemId),
}

/// Result of a successful release.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReleaseEffect {
    /// The item went from occupied to idle.
    Released { previous: Option<LockTicket> },
    /// Unconditional release of an item that was already idle.
    AlreadyIdle,
}

/// Catalog entry as synced from the upstream marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: ItemId,
    pub account_id: AccountId,
    #[serde(default)]
    pub title: String,
    pub price: Money,
    #[serde(default)]
    pub listing: ListingStatus,
}

/// One sellable unit in the shared pool.
///
/// Occupancy, ticket and match time are private: they change only through
/// [`InventoryItem::occupy`], [`InventoryItem::release`] and catalog sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    id: ItemId,
    account_id: AccountId,
    #[serde(default)]
    title: String,
    price: Money,
    #[serde(default)]
    listing: ListingStatus,
    /// Absent occupancy (legacy records) is treated as idle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    occupancy: Option<Occupancy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_ticket: Option<LockTicket>,
    /// Epoch milliseconds of the match that produced the current lock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_matched_time: Option<i64>,
}

impl Entity for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl InventoryItem {
    /// Create a new idle item from a catalog entry.
    pub fn from_catalog(entry: CatalogEntry) -> Self {
        let occupancy = match entry.listing {
            ListingStatus::Sold => Occupancy::Sold,
            _ => Occupancy::Idle,
        };
        Self {
            id: entry.id,
            account_id: entry.account_id,
            title: entry.title,
            price: entry.price,
            listing: entry.listing,
            occupancy: Some(occupancy),
            lock_ticket: None,
            last_matched_time: None,
        }
    }

    pub fn id_typed(&self) -> &ItemId {
        &self.id
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn listing(&self) -> ListingStatus {
        self.listing
    }

    pub fn occupancy(&self) -> Occupancy {
        self.occupancy.unwrap_or(Occupancy::Idle)
    }

    pub fn lock_ticket(&self) -> Option<LockTicket> {
        self.lock_ticket
    }

    pub fn last_matched_time(&self) -> Option<i64> {
        self.last_matched_time
    }

    pub fn is_idle(&self) -> bool {
        self.occupancy() == Occupancy::Idle
    }

    /// Idle and listed as sellable upstream.
    pub fn is_eligible(&self) -> bool {
        self.is_idle() && self.listing == ListingStatus::OnSale
    }

    /// Whether `ticket` is the ticket of the reservation currently holding the item.
    pub fn is_held_by(&self, ticket: LockTicket) -> bool {
        self.occupancy() == Occupancy::Occupied && self.lock_ticket == Some(ticket)
    }

    /// idle → occupied, stamping the match time and recording `ticket`.
    pub fn occupy(&mut self, ticket: LockTicket, now_ms: i64) -> Result<(), LockError> {
        match self.occupancy() {
            Occupancy::Occupied => return Err(LockError::AlreadyOccupied(self.id.clone())),
            Occupancy::Sold => return Err(LockError::Sold(self.id.clone())),
            Occupancy::Idle => {}
        }
        if self.listing != ListingStatus::OnSale {
            return Err(LockError::NotListed(self.id.clone()));
        }

        self.occupancy = Some(Occupancy::Occupied);
        self.lock_ticket = Some(ticket);
        self.last_matched_time = Some(now_ms);
        Ok(())
    }

    /// occupied → idle.
    ///
    /// With `expected == None` the release is unconditional. With a ticket the
    /// release only applies when it matches the current ticket; otherwise state
    /// is left untouched.
    pub fn release(&mut self, expected: Option<LockTicket>) -> Result<ReleaseEffect, LockError> {
        if self.occupancy() == Occupancy::Sold {
            return Err(LockError::Sold(self.id.clone()));
        }

        if let Some(presented) = expected {
            if !self.is_held_by(presented) {
                return Err(LockError::StaleTicket {
                    item: self.id.clone(),
                    presented,
                    current: self.lock_ticket,
                });
            }
        } else if self.is_idle() {
            self.lock_ticket = None;
            self.last_matched_time = None;
            return Ok(ReleaseEffect::AlreadyIdle);
        }

        let previous = self.lock_ticket.take();
        self.occupancy = Some(Occupancy::Idle);
        self.last_matched_time = None;
        Ok(ReleaseEffect::Released { previous })
    }

    /// Update the listed price on behalf of the reservation holding `ticket`.
    pub fn set_price(&mut self, ticket: LockTicket, price: Money) -> Result<(), LockError> {
        if !self.is_held_by(ticket) {
            return Err(LockError::StaleTicket {
                item: self.id.clone(),
                presented: ticket,
                current: self.lock_ticket,
            });
        }
        self.price = price;
        Ok(())
    }

    /// Merge upstream catalog fields, preserving the engine-owned lock state.
    ///
    /// A sold listing moves the item to `sold` regardless of occupancy; this is
    /// the only transition into `sold`.
    pub fn apply_catalog(&mut self, entry: &CatalogEntry) {
        self.account_id = entry.account_id.clone();
        self.title = entry.title.clone();
        self.listing = entry.listing;
        if !matches!(self.occupancy(), Occupancy::Occupied) {
            self.price = entry.price;
        }

        if entry.listing == ListingStatus::Sold {
            self.occupancy = Some(Occupancy::Sold);
            self.lock_ticket = None;
            self.last_matched_time = None;
        }
    }
}
