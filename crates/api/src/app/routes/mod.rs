use axum::Router;

pub mod inventory;
pub mod orders;
pub mod reservations;
pub mod system;

/// Router for the engine's on-demand operations.
pub fn router() -> Router {
    Router::new()
        .nest("/inventory", inventory::router())
        .nest("/orders", orders::router())
        .nest("/reservations", reservations::router())
}
