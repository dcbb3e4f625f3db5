//! Inventory domain module.
//!
//! Business rules for the shared item pool: occupancy transitions guarded by
//! lock tickets, catalog sync, and candidate selection. Pure deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod selection;

pub use item::{CatalogEntry, InventoryItem, ListingStatus, LockError, Occupancy, ReleaseEffect};
pub use selection::{SelectionPolicy, eligible, select};
