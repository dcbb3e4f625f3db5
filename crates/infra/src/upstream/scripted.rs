use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::gateway::{GatewayError, UpstreamGateway, UpstreamRequest, UpstreamResponse};

type Scripted = Result<UpstreamResponse, GatewayError>;

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<String, VecDeque<Scripted>>,
    fallback: HashMap<String, Scripted>,
    calls: Vec<UpstreamRequest>,
}

/// In-process gateway answering from per-target scripts.
///
/// Queued responses are consumed in order; once a target's queue is empty its
/// fallback (if any) answers every further call. Unscripted targets fail with a
/// transport error. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, target: &str, response: Scripted) -> &Self {
        self.with_script(|s| {
            s.queued
                .entry(target.to_string())
                .or_default()
                .push_back(response)
        });
        self
    }

    pub fn push_ok(&self, target: &str, payload: JsonValue) -> &Self {
        self.enqueue(target, Ok(UpstreamResponse::ok(payload)))
    }

    pub fn push_rejected(&self, target: &str, code: i64, message: &str) -> &Self {
        self.enqueue(target, Ok(UpstreamResponse::rejected(code, message)))
    }

    pub fn push_transport_failure(&self, target: &str) -> &Self {
        self.enqueue(
            target,
            Err(GatewayError::Transport(format!("connection reset calling {target}"))),
        )
    }

    /// Answer every otherwise-unscripted call to `target` with `response`.
    pub fn set_fallback(&self, target: &str, response: Scripted) -> &Self {
        self.with_script(|s| {
            s.fallback.insert(target.to_string(), response);
        });
        self
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.with_script(|s| s.calls.clone())
    }

    pub fn calls_to(&self, target: &str) -> usize {
        self.with_script(|s| s.calls.iter().filter(|c| c.target == target).count())
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut guard = self.script.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl UpstreamGateway for ScriptedGateway {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, GatewayError> {
        self.with_script(|s| {
            let target = request.target.clone();
            s.calls.push(request);

            if let Some(next) = s.queued.get_mut(&target).and_then(VecDeque::pop_front) {
                return next;
            }
            match s.fallback.get(&target) {
                Some(response) => response.clone(),
                None => Err(GatewayError::Transport(format!(
                    "no scripted response for {target}"
                ))),
            }
        })
    }
}
