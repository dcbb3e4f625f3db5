use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockhold_core::ItemId;
use stockhold_infra::ReservationEngine;
use stockhold_inventory::{CatalogEntry, ReleaseEffect};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory))
        .route("/reload", post(reload_inventory))
        .route("/sync", post(sync_catalog))
        .route("/:id/release", post(release_item))
}

pub async fn list_inventory(Extension(engine): Extension<Arc<ReservationEngine>>) -> impl IntoResponse {
    Json(engine.inventory().await)
}

/// Re-read the item pool from the store.
pub async fn reload_inventory(Extension(engine): Extension<Arc<ReservationEngine>>) -> axum::response::Response {
    match engine.reload_inventory().await {
        Ok(items) => Json(serde_json::json!({ "items": items })).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Merge catalog entries pushed by the marketplace side.
pub async fn sync_catalog(
    Extension(engine): Extension<Arc<ReservationEngine>>,
    Json(entries): Json<Vec<CatalogEntry>>,
) -> axum::response::Response {
    match engine.sync_catalog(entries).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn release_item(
    Extension(engine): Extension<Arc<ReservationEngine>>,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    let item = ItemId::new(id);
    // Only an absent body means an unconditional release.
    let ticket = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<dto::ReleaseRequest>(&body) {
            Ok(req) => req.ticket,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", e.to_string());
            }
        }
    };

    match engine.release(&item, ticket).await {
        Ok(effect) => Json(serde_json::json!({
            "id": item.as_str(),
            "released": matches!(effect, ReleaseEffect::Released { .. }),
        }))
        .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
