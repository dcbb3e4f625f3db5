use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use stockhold_infra::ReservationEngine;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(reserve))
}

/// Match, lock and run the pipeline; 201 with order, deep link and log.
pub async fn reserve(
    Extension(engine): Extension<Arc<ReservationEngine>>,
    Json(body): Json<dto::ReserveRequest>,
) -> axum::response::Response {
    let request = match body.into_request() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match engine.reserve(request).await {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(failure) => errors::pipeline_failure_to_response(failure),
    }
}
