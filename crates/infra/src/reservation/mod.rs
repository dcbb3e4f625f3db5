//! Reservation & order-lifecycle engine.

pub mod engine;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod orchestrator;
pub mod order_book;
pub mod policy;
pub mod progress;
pub mod release;
pub mod settlement;

#[cfg(test)]
pub(crate) mod fixtures;

pub use engine::{EngineBuilder, ReservationEngine};
pub use error::{EngineError, ErrorKind};
pub use ledger::{CatalogSyncReport, InventoryLedger};
pub use matcher::{Matcher, Reservation};
pub use orchestrator::{Orchestrator, PipelineFailure, PipelineReport, ReservationRequest};
pub use order_book::OrderBook;
pub use policy::{AcceptAny, AmountPolicy, TrailingDigit};
pub use progress::{ProgressBoard, ProgressEntry, ProgressTracker};
pub use release::ReleaseCoordinator;
pub use settlement::Settlement;
