use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockhold_infra::{EngineError, ErrorKind, PipelineFailure};

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NoEligibleInventory | ErrorKind::StaleLockTicket => StatusCode::CONFLICT,
        ErrorKind::NoShippingAddress => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::UpstreamRejected | ErrorKind::UnparseableDeepLink => StatusCode::BAD_GATEWAY,
        ErrorKind::TransportFailure => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::UnknownAccount | ErrorKind::UnknownInventory | ErrorKind::UnknownOrder => {
            StatusCode::NOT_FOUND
        }
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
    }
}

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    let kind = err.kind();
    json_error(status_for(kind), kind.as_str(), err.to_string())
}

/// Failed pipeline: kind + message plus the progress log and, when one was
/// persisted, the pending order.
pub fn pipeline_failure_to_response(failure: PipelineFailure) -> axum::response::Response {
    let kind = failure.kind();
    (
        status_for(kind),
        axum::Json(json!({
            "error": kind.as_str(),
            "message": failure.error.to_string(),
            "order": failure.order,
            "log": failure.log,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
