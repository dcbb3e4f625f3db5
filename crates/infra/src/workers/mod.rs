//! Timer-driven reconciliation: status polling and order expiry.

pub mod periodic;
pub mod poller;
pub mod sweeper;

pub use periodic::{PeriodicTask, PeriodicWorker, WorkerHandle};
pub use poller::{PollReport, StatusPoller};
pub use sweeper::{ExpirySweeper, SweepReport};
