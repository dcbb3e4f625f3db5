//! Record store boundary.
//!
//! The engine treats persistence as an opaque get/put-by-collection service with
//! last-write-wins semantics. Correctness comes from the engine's own
//! serialization (ticket CAS, re-read-before-write), not from the store.

pub mod in_memory;
pub mod json_file;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use json_file::JsonFileStore;
pub use r#trait::{Store, StoreError, collections, load, save};
