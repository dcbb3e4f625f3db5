use serde::{Deserialize, Serialize};

use stockhold_core::{AccountId, DomainError, Entity, ItemId, LockTicket, Money, OrderId};

/// Order status lifecycle.
///
/// `success`, `cancelled` and `refunded` are terminal. `failed` closes the
/// attempt without being terminal in the reconciliation sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Success,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Success | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    pub fn is_pending(self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Success => "success",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of a requested status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status changed.
    Applied { from: OrderStatus },
    /// The order had already reached a terminal status; nothing changed.
    Ignored { current: OrderStatus },
}

impl Transition {
    pub fn is_applied(self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// Fields known once the upstream order exists and a payment session was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub external_ref: String,
    pub pay_session_id: Option<String>,
    pub buyer_id: AccountId,
    pub inventory_id: ItemId,
    pub seller_id: AccountId,
    pub amount: Money,
    pub lock_ticket: LockTicket,
    pub payment_url: String,
    pub created_at_ms: i64,
}

/// One buyer-initiated payment attempt.
///
/// Never deleted: terminal orders stay in the store as an audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pay_session_id: Option<String>,
    /// Legacy records may have no buyer attribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    buyer_id: Option<AccountId>,
    inventory_id: ItemId,
    seller_id: AccountId,
    amount: Money,
    status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_ticket: Option<LockTicket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deep_link: Option<String>,
    created_at_ms: i64,
    #[serde(default)]
    updated_at_ms: i64,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Order {
    /// A freshly placed order, persisted as `pending`.
    pub fn pending(placed: PlacedOrder) -> Self {
        Self {
            id: placed.id,
            external_ref: Some(placed.external_ref),
            pay_session_id: placed.pay_session_id,
            buyer_id: Some(placed.buyer_id),
            inventory_id: placed.inventory_id,
            seller_id: placed.seller_id,
            amount: placed.amount,
            status: OrderStatus::Pending,
            lock_ticket: Some(placed.lock_ticket),
            payment_url: Some(placed.payment_url),
            deep_link: None,
            created_at_ms: placed.created_at_ms,
            updated_at_ms: placed.created_at_ms,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn external_ref(&self) -> Option<&str> {
        self.external_ref.as_deref()
    }

    pub fn pay_session_id(&self) -> Option<&str> {
        self.pay_session_id.as_deref()
    }

    pub fn buyer_id(&self) -> Option<&AccountId> {
        self.buyer_id.as_ref()
    }

    pub fn inventory_id(&self) -> &ItemId {
        &self.inventory_id
    }

    pub fn seller_id(&self) -> &AccountId {
        &self.seller_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lock_ticket(&self) -> Option<LockTicket> {
        self.lock_ticket
    }

    pub fn payment_url(&self) -> Option<&str> {
        self.payment_url.as_deref()
    }

    pub fn deep_link(&self) -> Option<&str> {
        self.deep_link.as_deref()
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn updated_at_ms(&self) -> i64 {
        self.updated_at_ms
    }

    /// Drift-corrected age at `now_ms` (never negative).
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.created_at_ms).max(0)
    }

    /// Move to `to`, unless a terminal status was already recorded.
    ///
    /// Terminal statuses are never overwritten, so repeating a transition that
    /// another component already committed is a harmless no-op.
    pub fn transition(&mut self, to: OrderStatus, now_ms: i64) -> Result<Transition, DomainError> {
        if to == OrderStatus::Pending {
            return Err(DomainError::validation("orders cannot return to pending"));
        }
        if self.status.is_terminal() {
            return Ok(Transition::Ignored {
                current: self.status,
            });
        }

        let from = self.status;
        self.status = to;
        self.updated_at_ms = now_ms;
        Ok(Transition::Applied { from })
    }

    /// Record the app-level payment URI extracted after the order was placed.
    pub fn attach_deep_link(&mut self, deep_link: impl Into<String>, now_ms: i64) {
        self.deep_link = Some(deep_link.into());
        self.updated_at_ms = now_ms;
    }
}
