//! Typed marketplace operations over an [`UpstreamGateway`].

use std::sync::Arc;

use serde_json::{Value as JsonValue, json};
use thiserror::Error;

use stockhold_core::{ItemId, Money};
use stockhold_orders::UpstreamOrderState;

use crate::accounts::{Account, ShippingAddress};

use super::gateway::{GatewayError, UpstreamGateway, UpstreamRequest, UpstreamResponse};

/// Upstream endpoints.
pub mod targets {
    pub const UPDATE_PRICE: &str = "/item/price/update";
    pub const ADDRESSES: &str = "/buyer/addresses";
    pub const CREATE_ORDER: &str = "/order/create";
    pub const CASHIER_SESSION: &str = "/cashier/session";
    pub const ORDER_DETAIL: &str = "/order/detail";
    pub const CANCEL_ORDER: &str = "/order/cancel";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Transport(String),

    #[error("upstream rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

impl From<GatewayError> for UpstreamError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Transport(msg) => UpstreamError::Transport(msg),
            GatewayError::Decode(msg) => UpstreamError::Malformed(msg),
        }
    }
}

/// Identifiers returned by order creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub external_ref: String,
    pub pay_session_id: Option<String>,
}

#[derive(Clone)]
pub struct MarketplaceClient {
    gateway: Arc<dyn UpstreamGateway>,
}

impl MarketplaceClient {
    pub fn new(gateway: Arc<dyn UpstreamGateway>) -> Self {
        Self { gateway }
    }

    /// Set the listed price of `item` (seller credentials, minor units).
    pub async fn update_price(
        &self,
        seller: &Account,
        item: &ItemId,
        price: Money,
    ) -> Result<(), UpstreamError> {
        let body = json!({ "itemId": item.as_str(), "price": price.minor() });
        self.call(UpstreamRequest::post(targets::UPDATE_PRICE, &seller.credentials, body))
            .await
            .map(|_| ())
    }

    /// Buyer's saved addresses, in upstream order.
    pub async fn shipping_addresses(
        &self,
        buyer: &Account,
    ) -> Result<Vec<ShippingAddress>, UpstreamError> {
        let payload = self
            .call(UpstreamRequest::post(targets::ADDRESSES, &buyer.credentials, json!({})))
            .await?;
        let list = match payload {
            JsonValue::Object(mut map) => map
                .remove("addresses")
                .unwrap_or(JsonValue::Array(Vec::new())),
            JsonValue::Null => JsonValue::Array(Vec::new()),
            list @ JsonValue::Array(_) => list,
            other => return Err(UpstreamError::Malformed(format!("address list: {other}"))),
        };
        serde_json::from_value(list).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    pub async fn create_order(
        &self,
        buyer: &Account,
        item: &ItemId,
        address: &ShippingAddress,
    ) -> Result<CreatedOrder, UpstreamError> {
        let body = json!({ "itemId": item.as_str(), "addressId": address.id });
        let payload = self
            .call(UpstreamRequest::post(targets::CREATE_ORDER, &buyer.credentials, body))
            .await?;

        let external_ref = string_field(&payload, "orderId")
            .ok_or_else(|| UpstreamError::Malformed("order creation returned no orderId".to_string()))?;
        Ok(CreatedOrder {
            external_ref,
            pay_session_id: string_field(&payload, "paySessionId"),
        })
    }

    /// Open a payment session for exactly `amount`; returns the redirect URL.
    pub async fn payment_session(
        &self,
        buyer: &Account,
        order: &CreatedOrder,
        amount: Money,
    ) -> Result<String, UpstreamError> {
        let body = json!({
            "orderId": order.external_ref,
            "paySessionId": order.pay_session_id,
            "amount": amount.minor(),
        });
        let payload = self
            .call(UpstreamRequest::post(targets::CASHIER_SESSION, &buyer.credentials, body))
            .await?;

        string_field(&payload, "redirectUrl")
            .or_else(|| string_field(&payload, "url"))
            .or_else(|| payload.as_str().map(str::to_string))
            .ok_or_else(|| UpstreamError::Malformed("payment session returned no redirect URL".to_string()))
    }

    /// Raw body of the payment redirect page.
    pub async fn fetch_redirect(&self, buyer: &Account, url: &str) -> Result<String, UpstreamError> {
        let request = UpstreamRequest::get(url, &buyer.credentials).with_header("Accept", "text/html");
        let payload = self.call(request).await?;
        Ok(match payload {
            JsonValue::String(body) => body,
            other => other.to_string(),
        })
    }

    pub async fn order_status(
        &self,
        buyer: &Account,
        external_ref: &str,
    ) -> Result<UpstreamOrderState, UpstreamError> {
        let body = json!({ "orderId": external_ref });
        let payload = self
            .call(UpstreamRequest::post(targets::ORDER_DETAIL, &buyer.credentials, body))
            .await?;

        let code = payload
            .get("status")
            .or_else(|| payload.get("statusCode"))
            .and_then(JsonValue::as_i64);
        let text = string_field(&payload, "statusText")
            .or_else(|| payload.get("status").and_then(JsonValue::as_str).map(str::to_string));
        Ok(UpstreamOrderState { code, text })
    }

    pub async fn cancel_order(&self, buyer: &Account, external_ref: &str) -> Result<(), UpstreamError> {
        let body = json!({ "orderId": external_ref });
        self.call(UpstreamRequest::post(targets::CANCEL_ORDER, &buyer.credentials, body))
            .await
            .map(|_| ())
    }

    async fn call(&self, request: UpstreamRequest) -> Result<JsonValue, UpstreamError> {
        let UpstreamResponse {
            code,
            message,
            payload,
        } = self.gateway.send(request).await?;
        if code != 0 {
            return Err(UpstreamError::Rejected { code, message });
        }
        Ok(payload)
    }
}

/// String or numeric field rendered as a string.
fn string_field(payload: &JsonValue, key: &str) -> Option<String> {
    match payload.get(key)? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountRole, Credentials};
    use crate::upstream::{Method, ScriptedGateway};
    use stockhold_core::AccountId;

    fn buyer() -> Account {
        Account {
            id: AccountId::new("b1"),
            role: AccountRole::Buyer,
            credentials: Credentials::new("cookie-b1"),
            pinned_address: None,
        }
    }

    fn client(gw: &Arc<ScriptedGateway>) -> MarketplaceClient {
        MarketplaceClient::new(gw.clone())
    }

    #[tokio::test]
    async fn numeric_order_ids_are_stringified() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.push_ok(targets::CREATE_ORDER, json!({"orderId": 3381920011u64, "paySessionId": "ps-7"}));

        let address = ShippingAddress { id: "a1".to_string(), label: String::new() };
        let created = client(&gw)
            .create_order(&buyer(), &ItemId::new("A"), &address)
            .await
            .unwrap();
        assert_eq!(created.external_ref, "3381920011");
        assert_eq!(created.pay_session_id.as_deref(), Some("ps-7"));
    }

    #[tokio::test]
    async fn rejection_carries_code_and_message() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.push_rejected(targets::UPDATE_PRICE, 4001, "price change too frequent");

        let err = client(&gw)
            .update_price(&buyer(), &ItemId::new("A"), Money::from_minor(29800))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UpstreamError::Rejected {
                code: 4001,
                message: "price change too frequent".to_string()
            }
        );
    }

    #[tokio::test]
    async fn addresses_accept_wrapped_or_bare_lists() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.push_ok(targets::ADDRESSES, json!({"addresses": [{"id": "x", "label": "home"}]}))
            .push_ok(targets::ADDRESSES, json!([]));

        let c = client(&gw);
        assert_eq!(c.shipping_addresses(&buyer()).await.unwrap().len(), 1);
        assert!(c.shipping_addresses(&buyer()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn redirect_is_fetched_as_html_page() {
        let gw = Arc::new(ScriptedGateway::new());
        let url = "https://pay.example/cashier/redirect?s=1";
        gw.push_ok(url, json!("<html>ok</html>"));

        let page = client(&gw).fetch_redirect(&buyer(), url).await.unwrap();
        assert_eq!(page, "<html>ok</html>");

        let calls = gw.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::Get);
        assert!(calls[0].headers.iter().any(|(k, v)| k == "Accept" && v == "text/html"));
    }

    #[tokio::test]
    async fn status_reads_code_and_text() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.push_ok(targets::ORDER_DETAIL, json!({"status": 2, "statusText": "待发货"}))
            .push_ok(targets::ORDER_DETAIL, json!({"status": "cancelled"}));

        let c = client(&gw);
        let first = c.order_status(&buyer(), "1").await.unwrap();
        assert_eq!(first.code, Some(2));
        assert_eq!(first.text.as_deref(), Some("待发货"));

        let second = c.order_status(&buyer(), "1").await.unwrap();
        assert_eq!(second.code, None);
        assert_eq!(second.text.as_deref(), Some("cancelled"));
    }
}
