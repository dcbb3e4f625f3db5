//! Status poller: drives pending orders to terminal outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use stockhold_core::OrderId;
use stockhold_orders::{Order, UpstreamOrderState, classify};

use crate::accounts::AccountDirectory;
use crate::reservation::{EngineError, Settlement};
use crate::upstream::MarketplaceClient;

use super::periodic::PeriodicTask;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollReport {
    pub checked: usize,
    pub settled: usize,
    pub failures: usize,
}

pub struct StatusPoller {
    accounts: AccountDirectory,
    market: MarketplaceClient,
    settlement: Arc<Settlement>,
}

impl StatusPoller {
    pub fn new(accounts: AccountDirectory, market: MarketplaceClient, settlement: Arc<Settlement>) -> Self {
        Self {
            accounts,
            market,
            settlement,
        }
    }

    /// Query every pending order once and settle the ones that reached a
    /// terminal outcome. Query failures are counted and retried next tick.
    pub async fn tick(&self) -> Result<PollReport, EngineError> {
        let pending = self.settlement.orders().pending().await?;
        let mut report = PollReport::default();
        let mut changes = Vec::new();

        for order in &pending {
            let state = match self.query(order).await {
                Ok(Some(state)) => state,
                Ok(None) => continue,
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(order = %order.id_typed(), error = %e, "status query failed");
                    continue;
                }
            };
            report.checked += 1;

            match classify(&state) {
                Some(outcome) => changes.push((order.id_typed(), outcome.into())),
                None => tracing::debug!(
                    order = %order.id_typed(),
                    code = ?state.code,
                    text = ?state.text,
                    "order still open"
                ),
            }
        }

        report.settled = self.settlement.settle(changes, "status poll").await?.len();
        Ok(report)
    }

    /// On-demand refresh of one order. Returns the order as stored afterwards.
    pub async fn poll_order(&self, id: OrderId) -> Result<Order, EngineError> {
        let orders = self.settlement.orders();
        let order = orders.get(id).await?.ok_or(EngineError::UnknownOrder(id))?;
        if !order.status().is_pending() {
            return Ok(order);
        }

        let Some(state) = self.query(&order).await? else {
            return Ok(order);
        };
        let Some(outcome) = classify(&state) else {
            return Ok(order);
        };

        let committed = self
            .settlement
            .settle(vec![(id, outcome.into())], "manual poll")
            .await?;
        match committed.into_iter().next() {
            Some(settled) => Ok(settled),
            None => orders.get(id).await?.ok_or(EngineError::UnknownOrder(id)),
        }
    }

    /// `None` when the order cannot be queried (no buyer or no upstream ref).
    async fn query(&self, order: &Order) -> Result<Option<UpstreamOrderState>, EngineError> {
        let (Some(buyer_id), Some(external_ref)) = (order.buyer_id(), order.external_ref()) else {
            return Ok(None);
        };
        let buyer = self
            .accounts
            .buyer(buyer_id)
            .await?
            .ok_or_else(|| EngineError::UnknownAccount(buyer_id.clone()))?;

        let state = self
            .market
            .order_status(&buyer, external_ref)
            .await
            .map_err(|e| EngineError::upstream("status query", e))?;
        Ok(Some(state))
    }
}

#[async_trait]
impl PeriodicTask for StatusPoller {
    fn name(&self) -> &'static str {
        "status-poller"
    }

    async fn run_once(&self) -> Result<(), EngineError> {
        let report = self.tick().await?;
        if report.settled > 0 || report.failures > 0 {
            tracing::info!(
                checked = report.checked,
                settled = report.settled,
                failures = report.failures,
                "status poll finished"
            );
        }
        Ok(())
    }
}
