//! Match-and-lock of one eligible item.

use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use stockhold_core::{AccountId, Clock, LockTicket};
use stockhold_inventory::{InventoryItem, SelectionPolicy, select};

use crate::accounts::Account;

use super::error::EngineError;
use super::ledger::InventoryLedger;

/// One item lock owned by a pipeline run until released or handed to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub item: InventoryItem,
    pub ticket: LockTicket,
}

pub struct Matcher {
    ledger: Arc<InventoryLedger>,
    clock: Arc<dyn Clock>,
    policy: SelectionPolicy,
    rng: Mutex<StdRng>,
}

impl Matcher {
    pub fn new(ledger: Arc<InventoryLedger>, clock: Arc<dyn Clock>, policy: SelectionPolicy) -> Self {
        Self::with_rng(ledger, clock, policy, StdRng::from_entropy())
    }

    /// Deterministic picks, for tests and replays.
    pub fn with_seed(
        ledger: Arc<InventoryLedger>,
        clock: Arc<dyn Clock>,
        policy: SelectionPolicy,
        seed: u64,
    ) -> Self {
        Self::with_rng(ledger, clock, policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        ledger: Arc<InventoryLedger>,
        clock: Arc<dyn Clock>,
        policy: SelectionPolicy,
        rng: StdRng,
    ) -> Self {
        Self {
            ledger,
            clock,
            policy,
            rng: Mutex::new(rng),
        }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Select an eligible item, mark it occupied under a fresh ticket, persist.
    ///
    /// Selection and lock happen in one ledger critical section, so two
    /// concurrent calls never receive the same item. An empty eligible set
    /// fails with no side effects.
    pub async fn match_and_lock(&self, seller: Option<&AccountId>) -> Result<Reservation, EngineError> {
        let now_ms = self.clock.now_ms();
        let reservation = self
            .ledger
            .mutate(|items| {
                let picked = {
                    let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
                    select(items.values(), &self.policy, seller, &mut *rng)
                        .map(|item| item.id_typed().clone())
                }
                .ok_or(EngineError::NoEligibleInventory)?;

                let item = items
                    .get_mut(&picked)
                    .ok_or_else(|| EngineError::UnknownInventory(picked.clone()))?;
                let ticket = LockTicket::new();
                item.occupy(ticket, now_ms)?;
                Ok(Reservation {
                    item: item.clone(),
                    ticket,
                })
            })
            .await?;

        tracing::info!(
            item = %reservation.item.id_typed(),
            seller = %reservation.item.account_id(),
            ticket = %reservation.ticket,
            "inventory locked"
        );
        Ok(reservation)
    }

    /// Uniform pick among buyer accounts.
    pub fn choose_buyer<'a>(&self, buyers: &'a [Account]) -> Option<&'a Account> {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        buyers.choose(&mut *rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::fixtures::{Fixture, T0};
    use std::collections::HashSet;
    use stockhold_core::ItemId;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_matches_never_share_an_item() {
        let fx = Fixture::with_items(&["A", "B", "C", "D", "E"]).await;
        let matcher = Arc::new(fx.matcher(SelectionPolicy::Random));

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let matcher = matcher.clone();
            tasks.push(tokio::spawn(async move { matcher.match_and_lock(None).await }));
        }

        let mut won = HashSet::new();
        let mut exhausted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(r) => assert!(won.insert(r.item.id_typed().clone())),
                Err(EngineError::NoEligibleInventory) => exhausted += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won.len(), 5);
        assert_eq!(exhausted, 15);
        assert!(fx.ledger.snapshot().await.iter().all(|i| !i.is_idle()));
    }

    #[tokio::test]
    async fn lock_stamps_match_time_and_ticket() {
        let fx = Fixture::with_items(&["A"]).await;
        let matcher = fx.matcher(SelectionPolicy::Random);

        let r = matcher.match_and_lock(None).await.unwrap();
        let stored = matcher.ledger.get(&ItemId::new("A")).await.unwrap();
        assert!(stored.is_held_by(r.ticket));
        assert_eq!(stored.last_matched_time(), Some(T0));
    }

    #[tokio::test]
    async fn empty_pool_has_no_side_effects() {
        let fx = Fixture::with_items(&[]).await;
        let matcher = fx.matcher(SelectionPolicy::Random);
        assert_eq!(
            matcher.match_and_lock(None).await.unwrap_err(),
            EngineError::NoEligibleInventory
        );
        assert_eq!(fx.store.write_count(crate::store::collections::INVENTORY), 0);
    }

    #[tokio::test]
    async fn seller_selector_restricts_pick() {
        let fx = Fixture::with_catalog(&[("A", "s1"), ("B", "s2")]).await;
        let matcher = fx.matcher(SelectionPolicy::Random);

        let r = matcher.match_and_lock(Some(&AccountId::new("s2"))).await.unwrap();
        assert_eq!(r.item.id_typed().as_str(), "B");
        assert_eq!(
            matcher.match_and_lock(Some(&AccountId::new("s2"))).await.unwrap_err(),
            EngineError::NoEligibleInventory
        );
    }
}
