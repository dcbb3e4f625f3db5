//! Classification of upstream order status into engine outcomes.

use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

/// Upstream order status codes that carry a definite meaning.
pub mod codes {
    pub const AWAITING_PAYMENT: i64 = 1;
    pub const AWAITING_SHIPMENT: i64 = 2;
    pub const SHIPPED: i64 = 3;
    pub const COMPLETED: i64 = 4;
    pub const CANCELLED: i64 = 5;
    pub const REFUNDED: i64 = 6;
}

const SUCCESS_TEXT: &[&str] = &["待发货", "已付款", "已发货", "交易成功", "awaiting shipment", "paid"];
const CANCELLED_TEXT: &[&str] = &["已取消", "交易关闭", "cancelled", "canceled"];
const REFUNDED_TEXT: &[&str] = &["退款成功", "已退款", "refunded", "refund complete"];

/// Status snapshot as reported by the upstream order query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamOrderState {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Terminal outcome derived from an upstream status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Cancelled,
    Refunded,
}

impl From<Outcome> for OrderStatus {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Success => OrderStatus::Success,
            Outcome::Cancelled => OrderStatus::Cancelled,
            Outcome::Refunded => OrderStatus::Refunded,
        }
    }
}

fn text_matches(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Map an upstream status to a terminal outcome; `None` means "still open".
///
/// Priority: success, then cancellation, then refund. "unpaid" never counts
/// as paid.
pub fn classify(state: &UpstreamOrderState) -> Option<Outcome> {
    let text = state
        .text
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .unwrap_or_default();
    let text = text.replace("unpaid", "");

    let success_code = matches!(
        state.code,
        Some(codes::AWAITING_SHIPMENT | codes::SHIPPED | codes::COMPLETED)
    );
    if success_code || text_matches(&text, SUCCESS_TEXT) {
        return Some(Outcome::Success);
    }
    if state.code == Some(codes::CANCELLED) || text_matches(&text, CANCELLED_TEXT) {
        return Some(Outcome::Cancelled);
    }
    if state.code == Some(codes::REFUNDED) || text_matches(&text, REFUNDED_TEXT) {
        return Some(Outcome::Refunded);
    }
    None
}
