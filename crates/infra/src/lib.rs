//! `stockhold-infra`: engine runtime.
//!
//! Store and upstream boundaries, the reservation engine built on them, and
//! the timers that reconcile orders and locks.

pub mod accounts;
pub mod config;
pub mod reservation;
pub mod store;
pub mod upstream;
pub mod workers;

pub use config::{ConfigError, EngineConfig};
pub use reservation::{
    EngineError, ErrorKind, PipelineFailure, PipelineReport, ReservationEngine, ReservationRequest,
};
