//! `stockhold-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::DomainError;
pub use id::{AccountId, ItemId, LockTicket, OrderId};
pub use money::Money;
pub use value_object::ValueObject;
