use serde::Deserialize;

use stockhold_core::{AccountId, LockTicket, Money};
use stockhold_infra::ReservationRequest;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    /// Major units, e.g. `"298.00"`.
    pub amount: String,
    pub buyer: Option<AccountId>,
    pub seller: Option<AccountId>,
}

impl ReserveRequest {
    pub fn into_request(self) -> Result<ReservationRequest, axum::response::Response> {
        let amount = Money::parse_major(&self.amount).map_err(|e| {
            errors::json_error(axum::http::StatusCode::BAD_REQUEST, "invalid_request", e.to_string())
        })?;
        Ok(ReservationRequest {
            amount,
            buyer: self.buyer,
            seller: self.seller,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    /// Omit for an unconditional (administrative) release.
    pub ticket: Option<LockTicket>,
}
