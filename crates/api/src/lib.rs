//! Admin HTTP surface and daemon wiring for the reservation engine.

pub mod app;
pub mod config;
