//! Transaction pipeline: price → address → order → payment link → deep link.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockhold_core::{AccountId, Clock, Money, OrderId};
use stockhold_orders::{Order, PipelineStage, PlacedOrder};

use crate::accounts::{Account, AccountDirectory};
use crate::upstream::{CreatedOrder, DeepLinkExtractor, MarketplaceClient};

use super::error::{EngineError, ErrorKind};
use super::ledger::InventoryLedger;
use super::matcher::{Matcher, Reservation};
use super::order_book::OrderBook;
use super::policy::AmountPolicy;
use super::progress::{ProgressBoard, ProgressEntry, ProgressTracker};
use super::release::ReleaseCoordinator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub amount: Money,
    #[serde(default)]
    pub buyer: Option<AccountId>,
    #[serde(default)]
    pub seller: Option<AccountId>,
}

impl ReservationRequest {
    pub fn new(amount: Money) -> Self {
        Self {
            amount,
            buyer: None,
            seller: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub order: Order,
    pub deep_link: String,
    pub log: Vec<ProgressEntry>,
}

/// A failed run: the error, the pending order if one was persisted, and the
/// log up to the failure.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    pub error: EngineError,
    pub order: Option<Order>,
    pub log: Vec<ProgressEntry>,
}

impl PipelineFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

pub struct Orchestrator {
    pub(crate) accounts: AccountDirectory,
    pub(crate) matcher: Arc<Matcher>,
    pub(crate) ledger: Arc<InventoryLedger>,
    pub(crate) release: Arc<ReleaseCoordinator>,
    pub(crate) orders: Arc<OrderBook>,
    pub(crate) market: MarketplaceClient,
    pub(crate) deep_links: DeepLinkExtractor,
    pub(crate) amount_policy: Arc<dyn AmountPolicy>,
    pub(crate) board: Arc<ProgressBoard>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub async fn run(&self, request: ReservationRequest) -> Result<PipelineReport, PipelineFailure> {
        self.run_observed(request, ProgressTracker::new(self.clock.clone()))
            .await
    }

    /// Run with a caller-supplied tracker (subscribe before calling to watch
    /// the stage move).
    pub async fn run_observed(
        &self,
        request: ReservationRequest,
        mut progress: ProgressTracker,
    ) -> Result<PipelineReport, PipelineFailure> {
        let (buyer, reservation) = match self.prepare(&request).await {
            Ok(prepared) => prepared,
            Err(error) => {
                progress.note(format!("request rejected: {error}"));
                return Err(PipelineFailure {
                    error,
                    order: None,
                    log: progress.into_log(),
                });
            }
        };

        let (order, redirect_url) = match self
            .place(&reservation, &buyer, request.amount, &mut progress)
            .await
        {
            Ok(placed) => placed,
            Err(error) => {
                progress.note(format!("failed: {error}"));
                self.roll_back(&reservation, &mut progress).await;
                progress.advance(PipelineStage::Idle, "reservation released");
                return Err(PipelineFailure {
                    error,
                    order: None,
                    log: progress.into_log(),
                });
            }
        };

        progress.advance(
            PipelineStage::AwaitingPayment,
            format!(
                "order {} placed for {}; awaiting payment",
                order.external_ref().unwrap_or_default(),
                order.amount()
            ),
        );
        self.board.register(order.id_typed(), &progress);

        match self.extract_deep_link(&buyer, order.id_typed(), &redirect_url).await {
            Ok((order, deep_link)) => {
                progress.note("deep link ready");
                Ok(PipelineReport {
                    order,
                    deep_link,
                    log: progress.into_log(),
                })
            }
            Err(error) => {
                // The order stays pending and keeps the lock; expiry reclaims it.
                progress.note(format!("deep link extraction failed: {error}"));
                Err(PipelineFailure {
                    error,
                    order: Some(order),
                    log: progress.into_log(),
                })
            }
        }
    }

    /// Checks that must pass before any lock is taken, then the lock itself.
    async fn prepare(&self, request: &ReservationRequest) -> Result<(Account, Reservation), EngineError> {
        self.amount_policy
            .check(request.amount)
            .map_err(EngineError::InvalidRequest)?;

        let buyer = match &request.buyer {
            Some(id) => self
                .accounts
                .buyer(id)
                .await?
                .ok_or_else(|| EngineError::UnknownAccount(id.clone()))?,
            None => {
                let buyers = self.accounts.buyers().await?;
                self.matcher
                    .choose_buyer(&buyers)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownAccount(AccountId::new("<any buyer>")))?
            }
        };

        let reservation = self.matcher.match_and_lock(request.seller.as_ref()).await?;
        Ok((buyer, reservation))
    }

    /// Steps 1-4 and the pending-order write. Any error here leaves no order.
    async fn place(
        &self,
        reservation: &Reservation,
        buyer: &Account,
        amount: Money,
        progress: &mut ProgressTracker,
    ) -> Result<(Order, String), EngineError> {
        let item_id = reservation.item.id_typed();
        let ticket = reservation.ticket;

        progress.advance(
            PipelineStage::AligningPrice,
            format!("aligning price of item {item_id} to {amount}"),
        );
        let seller_id = reservation.item.account_id();
        let seller = self
            .accounts
            .seller(seller_id)
            .await?
            .ok_or_else(|| EngineError::UnknownAccount(seller_id.clone()))?;
        self.market
            .update_price(&seller, item_id, amount)
            .await
            .map_err(|e| EngineError::upstream(PipelineStage::AligningPrice.label(), e))?;
        self.ledger
            .mutate(|items| {
                let item = items
                    .get_mut(item_id)
                    .ok_or_else(|| EngineError::UnknownInventory(item_id.clone()))?;
                Ok(item.set_price(ticket, amount)?)
            })
            .await?;

        progress.advance(
            PipelineStage::ResolvingAddress,
            format!("resolving shipping address for buyer {}", buyer.id),
        );
        let address = match &buyer.pinned_address {
            Some(pinned) => {
                progress.note(format!("using pinned address {}", pinned.id));
                pinned.clone()
            }
            None => self
                .market
                .shipping_addresses(buyer)
                .await
                .map_err(|e| EngineError::upstream(PipelineStage::ResolvingAddress.label(), e))?
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::NoShippingAddress(buyer.id.clone()))?,
        };

        progress.advance(PipelineStage::CreatingOrder, "creating upstream order");
        let created = self
            .market
            .create_order(buyer, item_id, &address)
            .await
            .map_err(|e| EngineError::upstream(PipelineStage::CreatingOrder.label(), e))?;
        progress.note(format!("upstream order {} created", created.external_ref));

        match self.open_payment(reservation, buyer, &created, amount, progress).await {
            Ok(placed) => Ok(placed),
            Err(e) => {
                self.cancel_quietly(buyer, &created).await;
                Err(e)
            }
        }
    }

    /// Step 4 and the pending-order write.
    async fn open_payment(
        &self,
        reservation: &Reservation,
        buyer: &Account,
        created: &CreatedOrder,
        amount: Money,
        progress: &mut ProgressTracker,
    ) -> Result<(Order, String), EngineError> {
        progress.advance(
            PipelineStage::AcquiringPaymentLink,
            format!("requesting payment session for {amount}"),
        );
        let redirect_url = self
            .market
            .payment_session(buyer, created, amount)
            .await
            .map_err(|e| EngineError::upstream(PipelineStage::AcquiringPaymentLink.label(), e))?;

        let item_id = reservation.item.id_typed();
        let still_held = self
            .ledger
            .get(item_id)
            .await
            .is_some_and(|item| item.is_held_by(reservation.ticket));
        if !still_held {
            return Err(EngineError::StaleLockTicket(item_id.clone()));
        }

        let order = Order::pending(PlacedOrder {
            id: OrderId::new(),
            external_ref: created.external_ref.clone(),
            pay_session_id: created.pay_session_id.clone(),
            buyer_id: buyer.id.clone(),
            inventory_id: item_id.clone(),
            seller_id: reservation.item.account_id().clone(),
            amount,
            lock_ticket: reservation.ticket,
            payment_url: redirect_url.clone(),
            created_at_ms: self.clock.now_ms(),
        });
        self.orders.insert(order.clone()).await?;
        Ok((order, redirect_url))
    }

    async fn extract_deep_link(
        &self,
        buyer: &Account,
        order_id: OrderId,
        redirect_url: &str,
    ) -> Result<(Order, String), EngineError> {
        let body = self
            .market
            .fetch_redirect(buyer, redirect_url)
            .await
            .map_err(|e| EngineError::upstream("extracting deep link", e))?;
        let deep_link = self
            .deep_links
            .extract(&body)
            .ok_or(EngineError::UnparseableDeepLink)?;

        let link = deep_link.clone();
        let order = self
            .orders
            .update(order_id, move |order, now_ms| {
                order.attach_deep_link(link, now_ms);
                order.clone()
            })
            .await?;
        Ok((order, deep_link))
    }

    async fn roll_back(&self, reservation: &Reservation, progress: &mut ProgressTracker) {
        let item = reservation.item.id_typed();
        match self
            .release
            .reclaim(item, Some(reservation.ticket), "pipeline rollback")
            .await
        {
            Ok(_) => {}
            Err(e) => {
                progress.note(format!("release of item {item} failed: {e}"));
                tracing::warn!(item = %item, error = %e, "rollback release failed; lock left for orphan sweep");
            }
        }
    }

    async fn cancel_quietly(&self, buyer: &Account, created: &CreatedOrder) {
        if let Err(e) = self.market.cancel_order(buyer, &created.external_ref).await {
            tracing::warn!(
                external_ref = %created.external_ref,
                error = %e,
                "best-effort cancel of abandoned upstream order failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::fixtures::{Fixture, REDIRECT_URL};
    use crate::store::collections;
    use crate::upstream::targets;
    use serde_json::json;
    use stockhold_core::ItemId;
    use stockhold_orders::OrderStatus;

    fn request() -> ReservationRequest {
        ReservationRequest::new(Money::from_minor(29800))
    }

    #[tokio::test]
    async fn happy_path_persists_pending_order_with_deep_link() {
        let fx = Fixture::with_items(&["A"]).await;
        fx.script_happy_path("3381920011");
        let orch = fx.orchestrator();

        let report = orch.run(request()).await.unwrap();
        assert_eq!(report.order.status(), OrderStatus::Pending);
        assert_eq!(report.order.external_ref(), Some("3381920011"));
        assert_eq!(report.order.deep_link(), Some(report.deep_link.as_str()));
        assert!(report.deep_link.starts_with("alipays://"));

        let steps: Vec<u8> = report.log.iter().map(|e| e.step).collect();
        assert!(steps.windows(2).all(|w| w[0] <= w[1]), "steps {steps:?}");
        assert_eq!(steps.last(), Some(&5));

        let item = fx.ledger.get(&ItemId::new("A")).await.unwrap();
        assert_eq!(report.order.lock_ticket().map(|t| item.is_held_by(t)), Some(true));
        assert_eq!(item.price(), Money::from_minor(29800));
        assert_eq!(fx.board.stage_of(report.order.id_typed()), Some(PipelineStage::AwaitingPayment));
    }

    #[tokio::test]
    async fn price_alignment_failure_releases_and_next_request_gets_item() {
        let fx = Fixture::with_catalog(&[("A", "s1")]).await;
        fx.gateway.push_rejected(targets::UPDATE_PRICE, 4001, "price change too frequent");
        let orch = fx.orchestrator();

        let failure = orch.run(request()).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::UpstreamRejected);
        assert!(failure.order.is_none());
        assert!(fx.ledger.get(&ItemId::new("A")).await.unwrap().is_eligible());
        assert!(fx.orders.list().await.unwrap().is_empty());
        assert_eq!(failure.log.last().map(|e| e.step), Some(0));

        fx.script_happy_path("42");
        let report = orch.run(request()).await.unwrap();
        assert_eq!(report.order.inventory_id().as_str(), "A");
    }

    #[tokio::test]
    async fn empty_address_book_fails_without_order() {
        let fx = Fixture::with_items(&["A"]).await;
        fx.gateway
            .push_ok(targets::UPDATE_PRICE, json!({}))
            .push_ok(targets::ADDRESSES, json!([]));

        let failure = fx.orchestrator().run(request()).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::NoShippingAddress);
        assert!(fx.ledger.get(&ItemId::new("A")).await.unwrap().is_idle());
        assert_eq!(fx.gateway.calls_to(targets::CREATE_ORDER), 0);
    }

    #[tokio::test]
    async fn pinned_address_skips_lookup() {
        let fx = Fixture::with_items(&["A"]).await;
        fx.pin_address("addr-home");
        fx.script_happy_path("7");

        let mut req = request();
        req.buyer = Some(AccountId::new("b1"));
        fx.orchestrator().run(req).await.unwrap();
        assert_eq!(fx.gateway.calls_to(targets::ADDRESSES), 0);
    }

    #[tokio::test]
    async fn payment_link_failure_cancels_upstream_order() {
        let fx = Fixture::with_items(&["A"]).await;
        fx.gateway
            .push_ok(targets::UPDATE_PRICE, json!({}))
            .push_ok(targets::ADDRESSES, json!([{"id": "a1"}]))
            .push_ok(targets::CREATE_ORDER, json!({"orderId": "9001"}))
            .push_transport_failure(targets::CASHIER_SESSION)
            .push_ok(targets::CANCEL_ORDER, json!({}));

        let failure = fx.orchestrator().run(request()).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::TransportFailure);
        assert_eq!(fx.gateway.calls_to(targets::CANCEL_ORDER), 1);
        assert!(fx.orders.list().await.unwrap().is_empty());
        assert!(fx.ledger.get(&ItemId::new("A")).await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn unparseable_deep_link_keeps_pending_order_and_lock() {
        let fx = Fixture::with_items(&["A"]).await;
        fx.script_until_payment("55");
        fx.gateway.push_ok(REDIRECT_URL, json!("<html>session expired</html>"));

        let failure = fx.orchestrator().run(request()).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::UnparseableDeepLink);
        let order = failure.order.expect("pending order is handed back");
        assert_eq!(order.status(), OrderStatus::Pending);

        let item = fx.ledger.get(&ItemId::new("A")).await.unwrap();
        assert!(order.lock_ticket().is_some_and(|t| item.is_held_by(t)));
        assert_eq!(fx.orders.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn amount_policy_rejects_before_locking() {
        let fx = Fixture::with_items(&["A"]).await;
        let mut orch = fx.orchestrator();
        orch.amount_policy = Arc::new(crate::reservation::policy::TrailingDigit(8));

        let failure = orch
            .run(ReservationRequest::new(Money::from_minor(29900)))
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::InvalidRequest);
        assert_eq!(fx.store.write_count(collections::INVENTORY), 0);
    }

    #[tokio::test]
    async fn unknown_buyer_fails_before_locking() {
        let fx = Fixture::with_items(&["A"]).await;
        let mut req = request();
        req.buyer = Some(AccountId::new("nobody"));

        let failure = fx.orchestrator().run(req).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::UnknownAccount);
        assert!(fx.ledger.get(&ItemId::new("A")).await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn observed_run_publishes_stage() {
        let fx = Fixture::with_items(&["A"]).await;
        fx.script_happy_path("1");
        let tracker = ProgressTracker::new(fx.clock.clone());
        let rx = tracker.subscribe();

        fx.orchestrator().run_observed(request(), tracker).await.unwrap();
        assert_eq!(*rx.borrow(), PipelineStage::AwaitingPayment);
    }
}
