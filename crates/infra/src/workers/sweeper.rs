//! Expiry sweeper: graceful cancel past validity, forced cancel past twice it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use stockhold_core::{Clock, ItemId, OrderId};
use stockhold_inventory::Occupancy;
use stockhold_orders::{Order, OrderStatus};

use crate::accounts::{AccountDirectory, Settings};
use crate::reservation::{EngineError, InventoryLedger, Settlement};
use crate::store::Store;
use crate::upstream::MarketplaceClient;

use super::periodic::PeriodicTask;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Pending orders looked at.
    pub examined: usize,
    /// Expired orders cancelled upstream (or with nothing upstream to cancel).
    pub cancelled: usize,
    /// Orders cancelled locally after hard expiry.
    pub forced: usize,
    /// Expired orders whose upstream cancel failed before hard expiry.
    pub deferred: usize,
    /// Locks with no pending order reclaimed after hard expiry.
    pub orphans_released: usize,
}

pub struct ExpirySweeper {
    store: Arc<dyn Store>,
    accounts: AccountDirectory,
    market: MarketplaceClient,
    settlement: Arc<Settlement>,
    ledger: Arc<InventoryLedger>,
    clock: Arc<dyn Clock>,
    default_validity: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn Store>,
        accounts: AccountDirectory,
        market: MarketplaceClient,
        settlement: Arc<Settlement>,
        ledger: Arc<InventoryLedger>,
        clock: Arc<dyn Clock>,
        default_validity: Duration,
    ) -> Self {
        Self {
            store,
            accounts,
            market,
            settlement,
            ledger,
            clock,
            default_validity,
        }
    }

    /// One sweep. All status changes are committed in a single order write.
    pub async fn tick(&self) -> Result<SweepReport, EngineError> {
        let validity = Settings::load(&*self.store)
            .await?
            .validity_or(self.default_validity);
        let validity_ms = i64::try_from(validity.as_millis()).unwrap_or(i64::MAX);
        let hard_expiry_ms = validity_ms.saturating_mul(2);
        let now_ms = self.clock.now_ms();

        let orders = self.settlement.orders();
        let pending = orders.pending().await?;
        let mut report = SweepReport::default();
        let mut changes = Vec::new();
        let mut forced: HashSet<OrderId> = HashSet::new();

        for order in &pending {
            report.examined += 1;
            let age_ms = order.age_ms(now_ms);
            if age_ms <= validity_ms {
                continue;
            }
            // The poller may have settled it since the snapshot was taken.
            match orders.get(order.id_typed()).await? {
                Some(current) if current.status().is_pending() => {}
                _ => continue,
            }

            if self.cancel_upstream(order).await {
                changes.push((order.id_typed(), OrderStatus::Cancelled));
            } else if age_ms > hard_expiry_ms {
                tracing::warn!(order = %order.id_typed(), age_ms, "hard expiry reached; forcing cancellation");
                forced.insert(order.id_typed());
                changes.push((order.id_typed(), OrderStatus::Cancelled));
            } else {
                report.deferred += 1;
            }
        }

        for order in self.settlement.settle(changes, "expiry sweep").await? {
            if forced.contains(&order.id_typed()) {
                report.forced += 1;
            } else {
                report.cancelled += 1;
            }
        }
        report.orphans_released = self.reclaim_orphans(now_ms, hard_expiry_ms).await?;

        if report.cancelled + report.forced + report.orphans_released > 0 {
            tracing::info!(
                examined = report.examined,
                cancelled = report.cancelled,
                forced = report.forced,
                deferred = report.deferred,
                orphans = report.orphans_released,
                validity_secs = validity.as_secs(),
                "expiry sweep finished"
            );
        }
        Ok(report)
    }

    /// Whether the order may be cancelled now. Orders with no buyer or no
    /// upstream reference have nothing to cancel upstream.
    async fn cancel_upstream(&self, order: &Order) -> bool {
        let (Some(buyer_id), Some(external_ref)) = (order.buyer_id(), order.external_ref()) else {
            return true;
        };
        let buyer = match self.accounts.buyer(buyer_id).await {
            Ok(Some(buyer)) => buyer,
            Ok(None) => {
                tracing::warn!(order = %order.id_typed(), buyer = %buyer_id, "buyer account missing; cannot cancel upstream");
                return false;
            }
            Err(e) => {
                tracing::warn!(order = %order.id_typed(), error = %e, "account lookup failed");
                return false;
            }
        };

        match self.market.cancel_order(&buyer, external_ref).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(order = %order.id_typed(), external_ref, error = %e, "upstream cancel failed");
                false
            }
        }
    }

    /// Release occupied items that no pending order references once their lock
    /// is older than the hard expiry (e.g. a release that failed after its
    /// order was settled).
    async fn reclaim_orphans(&self, now_ms: i64, hard_expiry_ms: i64) -> Result<usize, EngineError> {
        let referenced: HashSet<ItemId> = self
            .settlement
            .orders()
            .pending()
            .await?
            .iter()
            .map(|o| o.inventory_id().clone())
            .collect();

        let mut released = 0;
        for item in self.ledger.snapshot().await {
            if item.occupancy() != Occupancy::Occupied || referenced.contains(item.id_typed()) {
                continue;
            }
            let Some(matched_at) = item.last_matched_time() else {
                continue;
            };
            if now_ms - matched_at <= hard_expiry_ms {
                continue;
            }
            if self
                .settlement
                .release()
                .reclaim(item.id_typed(), item.lock_ticket(), "orphaned lock")
                .await?
            {
                released += 1;
            }
        }
        Ok(released)
    }
}

#[async_trait]
impl PeriodicTask for ExpirySweeper {
    fn name(&self) -> &'static str {
        "expiry-sweeper"
    }

    async fn run_once(&self) -> Result<(), EngineError> {
        self.tick().await.map(|_| ())
    }
}
