//! Order persistence with serialized, re-read-before-write updates.

use std::sync::Arc;

use tokio::sync::Mutex;

use stockhold_core::{Clock, OrderId};
use stockhold_orders::{Order, OrderStatus};

use crate::store::{Store, collections, load, save};

use super::error::EngineError;

/// All order writes go through here.
///
/// Each write takes the book's mutex, re-reads the collection, applies its
/// change to the fresh copy and writes it back. A transition committed by
/// another component is therefore always visible to the next writer.
pub struct OrderBook {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    write: Mutex<()>,
}

impl OrderBook {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<Order>, EngineError> {
        Ok(load(&*self.store, collections::ORDERS).await?)
    }

    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, EngineError> {
        Ok(self.list().await?.into_iter().find(|o| o.id_typed() == id))
    }

    pub async fn pending(&self) -> Result<Vec<Order>, EngineError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|o| o.status().is_pending())
            .collect())
    }

    pub async fn insert(&self, order: Order) -> Result<(), EngineError> {
        let _guard = self.write.lock().await;
        let mut orders = self.list().await?;
        if orders.iter().any(|o| o.id_typed() == order.id_typed()) {
            return Err(EngineError::InvalidRequest(format!(
                "order {} already exists",
                order.id_typed()
            )));
        }
        orders.push(order);
        save(&*self.store, collections::ORDERS, &orders).await?;
        Ok(())
    }

    /// Apply `f` to the freshly re-read order `id` and persist it.
    pub async fn update<T, F>(&self, id: OrderId, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Order, i64) -> T,
    {
        let _guard = self.write.lock().await;
        let mut orders = self.list().await?;
        let order = orders
            .iter_mut()
            .find(|o| o.id_typed() == id)
            .ok_or(EngineError::UnknownOrder(id))?;
        let out = f(order, self.clock.now_ms());
        save(&*self.store, collections::ORDERS, &orders).await?;
        Ok(out)
    }

    /// Commit terminal statuses in one write.
    ///
    /// Returns the orders whose status actually changed; an order already
    /// terminal in the fresh read is skipped, so the caller that gets it back
    /// is the only one entitled to release its lock.
    pub async fn commit_terminal(&self, changes: Vec<(OrderId, OrderStatus)>) -> Result<Vec<Order>, EngineError> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write.lock().await;
        let mut orders = self.list().await?;
        let now_ms = self.clock.now_ms();
        let mut applied = Vec::new();

        for (id, status) in changes {
            let Some(order) = orders.iter_mut().find(|o| o.id_typed() == id) else {
                tracing::warn!(order = %id, "terminal transition for unknown order");
                continue;
            };
            if order.transition(status, now_ms)?.is_applied() {
                applied.push(order.clone());
            } else {
                tracing::debug!(order = %id, current = %order.status(), requested = %status, "order already terminal");
            }
        }

        if !applied.is_empty() {
            save(&*self.store, collections::ORDERS, &orders).await?;
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::fixtures::Fixture;

    #[tokio::test]
    async fn terminal_transition_is_committed_once() {
        let fx = Fixture::with_items(&["A"]).await;
        let order = fx.place_pending("A").await;
        let book = fx.orders.clone();

        let first = book
            .commit_terminal(vec![(order.id_typed(), OrderStatus::Success)])
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = book
            .commit_terminal(vec![(order.id_typed(), OrderStatus::Cancelled)])
            .await
            .unwrap();
        assert!(second.is_empty());

        let stored = book.get(order.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Success);
    }

    #[tokio::test]
    async fn batch_commit_is_one_write() {
        let fx = Fixture::with_items(&["A", "B", "C"]).await;
        let ids: Vec<_> = [
            fx.place_pending("A").await,
            fx.place_pending("B").await,
            fx.place_pending("C").await,
        ]
        .iter()
        .map(|o| (o.id_typed(), OrderStatus::Cancelled))
        .collect();

        let before = fx.store.write_count(collections::ORDERS);
        let applied = fx.orders.commit_terminal(ids).await.unwrap();
        assert_eq!(applied.len(), 3);
        assert_eq!(fx.store.write_count(collections::ORDERS), before + 1);
    }

    #[tokio::test]
    async fn update_sees_writes_made_elsewhere() {
        let fx = Fixture::with_items(&["A"]).await;
        let order = fx.place_pending("A").await;

        let other_writer = OrderBook::new(fx.store.clone(), fx.clock.clone());
        other_writer
            .commit_terminal(vec![(order.id_typed(), OrderStatus::Refunded)])
            .await
            .unwrap();

        let status = fx
            .orders
            .update(order.id_typed(), |o, now| {
                o.attach_deep_link("alipays://x", now);
                o.status()
            })
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn update_of_unknown_order_fails() {
        let fx = Fixture::with_items(&[]).await;
        let id = OrderId::new();
        assert_eq!(
            fx.orders.update(id, |_, _| ()).await.unwrap_err(),
            EngineError::UnknownOrder(id)
        );
    }
}
