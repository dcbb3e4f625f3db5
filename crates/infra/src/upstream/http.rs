use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use serde_json::Value as JsonValue;

use super::gateway::{GatewayError, Method, UpstreamGateway, UpstreamRequest, UpstreamResponse};

/// reqwest-backed gateway.
///
/// Credentials travel as the `Cookie` header. JSON bodies carrying a `code`
/// field are decoded as the upstream envelope (`code`, `message`/`msg`,
/// `data`); anything else (payment pages) comes back as a string payload.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url_for(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            target.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl UpstreamGateway for HttpGateway {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, GatewayError> {
        let url = self.url_for(&request.target);
        let mut req = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url).json(&request.body),
        };
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(credentials) = &request.credentials {
            req = req.header(COOKIE, credentials.expose());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        tracing::debug!(target = %request.target, status = status.as_u16(), "upstream call");
        decode_envelope(status.as_u16(), text)
    }
}

fn decode_envelope(status: u16, text: String) -> Result<UpstreamResponse, GatewayError> {
    if let Ok(JsonValue::Object(mut map)) = serde_json::from_str::<JsonValue>(&text) {
        if let Some(raw_code) = map.get("code") {
            let code = match raw_code {
                JsonValue::Number(n) => n.as_i64(),
                JsonValue::String(s) => s.trim().parse().ok(),
                _ => None,
            }
            .ok_or_else(|| GatewayError::Decode(format!("non-numeric code {raw_code}")))?;
            let message = map
                .get("message")
                .or_else(|| map.get("msg"))
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();
            let payload = map.remove("data").unwrap_or(JsonValue::Null);
            return Ok(UpstreamResponse {
                code,
                message,
                payload,
            });
        }
    }

    if !(200..300).contains(&status) {
        let message: String = text.chars().take(256).collect();
        // A bare 5xx comes from the server or a proxy in front of it, not from the marketplace.
        if status >= 500 {
            return Err(GatewayError::Transport(format!("http {status}: {message}")));
        }
        return Ok(UpstreamResponse::rejected(i64::from(status), message));
    }
    Ok(UpstreamResponse::ok(JsonValue::String(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_json_envelope() {
        let resp = decode_envelope(
            200,
            r#"{"code":0,"msg":"ok","data":{"orderId":"881"}}"#.to_string(),
        )
        .unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.message, "ok");
        assert_eq!(resp.payload, json!({"orderId": "881"}));
    }

    #[test]
    fn string_codes_are_accepted() {
        let resp = decode_envelope(200, r#"{"code":"4001","message":"price locked"}"#.to_string()).unwrap();
        assert_eq!(resp.code, 4001);
        assert!(!resp.is_success());
    }

    #[test]
    fn html_pages_become_string_payloads() {
        let resp = decode_envelope(200, "<html>alipays://x</html>".to_string()).unwrap();
        assert_eq!(resp.payload, JsonValue::String("<html>alipays://x</html>".to_string()));
    }

    #[test]
    fn client_errors_without_envelope_are_rejections() {
        let resp = decode_envelope(404, "not found".to_string()).unwrap();
        assert_eq!(resp.code, 404);
        assert_eq!(resp.message, "not found");
    }

    #[test]
    fn server_errors_without_envelope_are_transport_failures() {
        let err = decode_envelope(502, "bad gateway".to_string()).unwrap_err();
        assert_eq!(err, GatewayError::Transport("http 502: bad gateway".to_string()));

        let resp = decode_envelope(500, r#"{"code":5001,"msg":"busy"}"#.to_string()).unwrap();
        assert_eq!(resp.code, 5001);
    }

    #[test]
    fn relative_targets_join_base_url() {
        let gw = HttpGateway::new("https://api.example/", Duration::from_secs(5)).unwrap();
        assert_eq!(gw.url_for("/order/create"), "https://api.example/order/create");
        assert_eq!(gw.url_for("https://pay.example/r"), "https://pay.example/r");
    }
}
