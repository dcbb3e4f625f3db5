use std::sync::Arc;

use stockhold_core::OrderId;
use stockhold_orders::{Order, OrderStatus};

use super::error::EngineError;
use super::order_book::OrderBook;
use super::progress::ProgressBoard;
use super::release::ReleaseCoordinator;

/// Terminal commit followed by the one release each committed order is owed.
///
/// Shared by the poller and the sweeper: whichever commits a transition first
/// gets the order back from [`OrderBook::commit_terminal`] and releases; the
/// other sees it already terminal and does nothing.
pub struct Settlement {
    orders: Arc<OrderBook>,
    release: Arc<ReleaseCoordinator>,
    board: Arc<ProgressBoard>,
}

impl Settlement {
    pub fn new(orders: Arc<OrderBook>, release: Arc<ReleaseCoordinator>, board: Arc<ProgressBoard>) -> Self {
        Self {
            orders,
            release,
            board,
        }
    }

    pub fn orders(&self) -> &Arc<OrderBook> {
        &self.orders
    }

    pub fn release(&self) -> &Arc<ReleaseCoordinator> {
        &self.release
    }

    pub async fn settle(&self, changes: Vec<(OrderId, OrderStatus)>, context: &str) -> Result<Vec<Order>, EngineError> {
        let committed = self.orders.commit_terminal(changes).await?;

        for order in &committed {
            tracing::info!(
                order = %order.id_typed(),
                item = %order.inventory_id(),
                status = %order.status(),
                context,
                "order settled"
            );
            if let Err(e) = self
                .release
                .reclaim(order.inventory_id(), order.lock_ticket(), context)
                .await
            {
                // The lock stays held; the sweeper's orphan pass picks it up.
                tracing::warn!(order = %order.id_typed(), error = %e, "release after settlement failed");
            }
            self.board.finish(order.id_typed(), order.status());
        }
        Ok(committed)
    }
}
