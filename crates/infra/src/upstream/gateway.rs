use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::accounts::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    /// Path relative to the gateway base, or an absolute URL.
    pub target: String,
    pub method: Method,
    pub credentials: Option<Credentials>,
    pub body: JsonValue,
    pub headers: Vec<(String, String)>,
}

impl UpstreamRequest {
    pub fn post(target: impl Into<String>, credentials: &Credentials, body: JsonValue) -> Self {
        Self {
            target: target.into(),
            method: Method::Post,
            credentials: Some(credentials.clone()),
            body,
            headers: Vec::new(),
        }
    }

    pub fn get(target: impl Into<String>, credentials: &Credentials) -> Self {
        Self {
            target: target.into(),
            method: Method::Get,
            credentials: Some(credentials.clone()),
            body: JsonValue::Null,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Upstream envelope. `code == 0` means accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub code: i64,
    pub message: String,
    pub payload: JsonValue,
}

impl UpstreamResponse {
    pub fn ok(payload: JsonValue) -> Self {
        Self {
            code: 0,
            message: String::new(),
            payload,
        }
    }

    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            payload: JsonValue::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("undecodable upstream response: {0}")]
    Decode(String),
}

/// Opaque transport to the upstream marketplace.
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, GatewayError>;
}

#[async_trait]
impl<G> UpstreamGateway for Arc<G>
where
    G: UpstreamGateway + ?Sized,
{
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, GatewayError> {
        (**self).send(request).await
    }
}
