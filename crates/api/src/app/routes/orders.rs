use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockhold_core::OrderId;
use stockhold_infra::ReservationEngine;

use crate::app::errors;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id/poll", post(poll_order))
}

pub async fn list_orders(Extension(engine): Extension<Arc<ReservationEngine>>) -> axum::response::Response {
    match engine.orders().await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn poll_order(
    Extension(engine): Extension<Arc<ReservationEngine>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };

    match engine.poll_order(id).await {
        Ok(order) => {
            let stage = engine.stage_of(id);
            Json(serde_json::json!({ "order": order, "stage": stage })).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}
