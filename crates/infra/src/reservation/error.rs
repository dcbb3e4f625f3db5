use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockhold_core::{AccountId, DomainError, ItemId, OrderId};
use stockhold_inventory::LockError;

use crate::store::StoreError;
use crate::upstream::UpstreamError;

/// Machine-readable error kind, surfaced to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoEligibleInventory,
    NoShippingAddress,
    UpstreamRejected,
    UnparseableDeepLink,
    StaleLockTicket,
    TransportFailure,
    UnknownAccount,
    UnknownInventory,
    UnknownOrder,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NoEligibleInventory => "no_eligible_inventory",
            ErrorKind::NoShippingAddress => "no_shipping_address",
            ErrorKind::UpstreamRejected => "upstream_rejected",
            ErrorKind::UnparseableDeepLink => "unparseable_deep_link",
            ErrorKind::StaleLockTicket => "stale_lock_ticket",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::UnknownAccount => "unknown_account",
            ErrorKind::UnknownInventory => "unknown_inventory",
            ErrorKind::UnknownOrder => "unknown_order",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no eligible inventory")]
    NoEligibleInventory,

    #[error("buyer {0} has no shipping address")]
    NoShippingAddress(AccountId),

    #[error("upstream rejected {step} (code {code}): {message}")]
    UpstreamRejected {
        step: String,
        code: i64,
        message: String,
    },

    #[error("payment page contained no deep link")]
    UnparseableDeepLink,

    #[error("lock ticket for item {0} is stale")]
    StaleLockTicket(ItemId),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("unknown account {0}")]
    UnknownAccount(AccountId),

    #[error("unknown inventory item {0}")]
    UnknownInventory(ItemId),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NoEligibleInventory => ErrorKind::NoEligibleInventory,
            EngineError::NoShippingAddress(_) => ErrorKind::NoShippingAddress,
            EngineError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            EngineError::UnparseableDeepLink => ErrorKind::UnparseableDeepLink,
            EngineError::StaleLockTicket(_) => ErrorKind::StaleLockTicket,
            EngineError::TransportFailure(_) => ErrorKind::TransportFailure,
            EngineError::UnknownAccount(_) => ErrorKind::UnknownAccount,
            EngineError::UnknownInventory(_) => ErrorKind::UnknownInventory,
            EngineError::UnknownOrder(_) => ErrorKind::UnknownOrder,
            EngineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Attribute an upstream failure to the step that made the call.
    pub fn upstream(step: impl Into<String>, err: UpstreamError) -> Self {
        match err {
            UpstreamError::Rejected { code, message } => EngineError::UpstreamRejected {
                step: step.into(),
                code,
                message,
            },
            UpstreamError::Transport(msg) => {
                EngineError::TransportFailure(format!("{}: {msg}", step.into()))
            }
            UpstreamError::Malformed(msg) => EngineError::UpstreamRejected {
                step: step.into(),
                code: -1,
                message: msg,
            },
        }
    }

    /// Transport failures are retried on the next tick, never treated as outcomes.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::TransportFailure(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        EngineError::TransportFailure(value.to_string())
    }
}

impl From<LockError> for EngineError {
    fn from(value: LockError) -> Self {
        match value {
            LockError::StaleTicket { item, .. } => EngineError::StaleLockTicket(item),
            other => EngineError::InvalidRequest(other.to_string()),
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        EngineError::InvalidRequest(value.to_string())
    }
}
