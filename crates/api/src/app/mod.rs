//! HTTP API application wiring (Axum router).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and mapping to engine types
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use stockhold_infra::ReservationEngine;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(engine: Arc<ReservationEngine>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(engine)))
}
