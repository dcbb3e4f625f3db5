//! Order domain module.
//!
//! The payment-attempt record, its status state machine, classification of
//! upstream status reports, and the observational pipeline stage.

pub mod classify;
pub mod order;
pub mod stage;

pub use classify::{Outcome, UpstreamOrderState, classify};
pub use order::{Order, OrderStatus, PlacedOrder, Transition};
pub use stage::PipelineStage;
