use std::sync::Arc;

use stockhold_core::{Clock, ItemId, LockTicket, OrderId};
use stockhold_inventory::{CatalogEntry, InventoryItem, ReleaseEffect};
use stockhold_orders::{Order, PipelineStage};

use crate::accounts::AccountDirectory;
use crate::config::EngineConfig;
use crate::store::Store;
use crate::upstream::{DeepLinkExtractor, MarketplaceClient, UpstreamGateway};
use crate::workers::{
    ExpirySweeper, PeriodicWorker, PollReport, StatusPoller, SweepReport, WorkerHandle,
};

use super::error::EngineError;
use super::ledger::{CatalogSyncReport, InventoryLedger};
use super::matcher::Matcher;
use super::orchestrator::{Orchestrator, PipelineFailure, PipelineReport, ReservationRequest};
use super::order_book::OrderBook;
use super::policy::AmountPolicy;
use super::progress::ProgressBoard;
use super::release::ReleaseCoordinator;
use super::settlement::Settlement;

pub struct EngineBuilder {
    config: EngineConfig,
    store: Arc<dyn Store>,
    gateway: Arc<dyn UpstreamGateway>,
    clock: Arc<dyn Clock>,
    amount_policy: Option<Arc<dyn AmountPolicy>>,
    rng_seed: Option<u64>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the policy derived from the config.
    pub fn amount_policy(mut self, policy: Arc<dyn AmountPolicy>) -> Self {
        self.amount_policy = Some(policy);
        self
    }

    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub async fn build(self) -> Result<ReservationEngine, EngineError> {
        let EngineBuilder {
            config,
            store,
            gateway,
            clock,
            amount_policy,
            rng_seed,
        } = self;

        let deep_links = DeepLinkExtractor::new(&config.deep_link_scheme)
            .map_err(|e| EngineError::InvalidRequest(format!("deep link scheme: {e}")))?;
        let ledger = Arc::new(InventoryLedger::load(store.clone()).await?);
        let matcher = Arc::new(match rng_seed {
            Some(seed) => Matcher::with_seed(ledger.clone(), clock.clone(), config.selection.clone(), seed),
            None => Matcher::new(ledger.clone(), clock.clone(), config.selection.clone()),
        });
        let orders = Arc::new(OrderBook::new(store.clone(), clock.clone()));
        let release = Arc::new(ReleaseCoordinator::new(ledger.clone()));
        let board = Arc::new(ProgressBoard::new());
        let settlement = Arc::new(Settlement::new(orders.clone(), release.clone(), board.clone()));
        let accounts = AccountDirectory::new(store.clone());
        let market = MarketplaceClient::new(gateway);

        let orchestrator = Orchestrator {
            accounts: accounts.clone(),
            matcher,
            ledger: ledger.clone(),
            release: release.clone(),
            orders: orders.clone(),
            market: market.clone(),
            deep_links,
            amount_policy: amount_policy.unwrap_or_else(|| config.amount_policy()),
            board: board.clone(),
            clock: clock.clone(),
        };
        let poller = Arc::new(StatusPoller::new(
            accounts.clone(),
            market.clone(),
            settlement.clone(),
        ));
        let sweeper = Arc::new(ExpirySweeper::new(
            store,
            accounts,
            market,
            settlement,
            ledger.clone(),
            clock.clone(),
            config.default_validity,
        ));

        tracing::info!(
            items = ledger.snapshot().await.len(),
            selection = ?config.selection,
            "reservation engine ready"
        );
        Ok(ReservationEngine {
            config,
            ledger,
            orders,
            release,
            orchestrator,
            poller,
            sweeper,
            board,
        })
    }
}

/// Facade over the engine's components, for the daemon and the admin surface.
pub struct ReservationEngine {
    config: EngineConfig,
    ledger: Arc<InventoryLedger>,
    orders: Arc<OrderBook>,
    release: Arc<ReleaseCoordinator>,
    orchestrator: Orchestrator,
    poller: Arc<StatusPoller>,
    sweeper: Arc<ExpirySweeper>,
    board: Arc<ProgressBoard>,
}

impl ReservationEngine {
    pub fn builder(
        store: Arc<dyn Store>,
        gateway: Arc<dyn UpstreamGateway>,
        clock: Arc<dyn Clock>,
    ) -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            store,
            gateway,
            clock,
            amount_policy: None,
            rng_seed: None,
        }
    }

    /// Match, lock and run the transaction pipeline.
    pub async fn reserve(&self, request: ReservationRequest) -> Result<PipelineReport, PipelineFailure> {
        self.orchestrator.run(request).await
    }

    pub async fn release(&self, item: &ItemId, ticket: Option<LockTicket>) -> Result<ReleaseEffect, EngineError> {
        self.release.release(item, ticket).await
    }

    pub async fn inventory(&self) -> Vec<InventoryItem> {
        self.ledger.snapshot().await
    }

    /// Replace the item cache with the store's contents (after an external edit).
    pub async fn reload_inventory(&self) -> Result<usize, EngineError> {
        self.ledger.reload().await
    }

    pub async fn sync_catalog(&self, entries: Vec<CatalogEntry>) -> Result<CatalogSyncReport, EngineError> {
        self.ledger.sync_catalog(entries).await
    }

    pub async fn orders(&self) -> Result<Vec<Order>, EngineError> {
        self.orders.list().await
    }

    pub async fn poll_order(&self, id: OrderId) -> Result<Order, EngineError> {
        self.poller.poll_order(id).await
    }

    pub async fn poll_once(&self) -> Result<PollReport, EngineError> {
        self.poller.tick().await
    }

    pub async fn sweep_once(&self) -> Result<SweepReport, EngineError> {
        self.sweeper.tick().await
    }

    /// Stage of a run whose order is still awaiting a terminal outcome.
    pub fn stage_of(&self, order: OrderId) -> Option<PipelineStage> {
        self.board.stage_of(order)
    }

    /// Start the poller and sweeper timers.
    pub fn spawn_workers(&self) -> Vec<WorkerHandle> {
        vec![
            PeriodicWorker::spawn(self.poller.clone(), self.config.poll_interval),
            PeriodicWorker::spawn(self.sweeper.clone(), self.config.sweep_interval),
        ]
    }
}
