//! Shared test wiring: seeded in-memory store, scripted upstream, manual clock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value as JsonValue, json};

use stockhold_core::{AccountId, Clock, ItemId, LockTicket, ManualClock, Money, OrderId};
use stockhold_inventory::SelectionPolicy;
use stockhold_orders::{Order, PlacedOrder};

use crate::accounts::AccountDirectory;
use crate::store::{InMemoryStore, collections};
use crate::upstream::{DeepLinkExtractor, MarketplaceClient, ScriptedGateway, targets};
use crate::workers::{ExpirySweeper, StatusPoller};

use super::ledger::InventoryLedger;
use super::matcher::Matcher;
use super::order_book::OrderBook;
use super::orchestrator::Orchestrator;
use super::policy::AcceptAny;
use super::progress::ProgressBoard;
use super::release::ReleaseCoordinator;
use super::settlement::Settlement;

pub(crate) const T0: i64 = 1_700_000_000_000;
pub(crate) const REDIRECT_URL: &str = "https://pay.example/cashier/redirect?s=1";
pub(crate) const PAGE_WITH_LINK: &str =
    r#"<script>window.location.href="alipays://platformapi/startapp?appId=20000067&token=t1";</script>"#;

pub(crate) struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InventoryLedger>,
    pub orders: Arc<OrderBook>,
    pub board: Arc<ProgressBoard>,
}

fn accounts(pinned: Option<&str>) -> Vec<JsonValue> {
    let mut buyer = json!({"id": "b1", "role": "buyer", "credentials": "cookie-b1"});
    if let Some(address) = pinned {
        buyer["pinnedAddress"] = json!({"id": address, "label": "pinned"});
    }
    vec![
        json!({"id": "s1", "role": "seller", "credentials": "cookie-s1"}),
        json!({"id": "s2", "role": "seller", "credentials": "cookie-s2"}),
        buyer,
    ]
}

impl Fixture {
    pub async fn with_items(ids: &[&str]) -> Self {
        let catalog: Vec<(&str, &str)> = ids.iter().map(|id| (*id, "s1")).collect();
        Self::with_catalog(&catalog).await
    }

    pub async fn with_catalog(catalog: &[(&str, &str)]) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store.seed(
            collections::INVENTORY,
            catalog
                .iter()
                .map(|(id, seller)| json!({"id": id, "accountId": seller, "title": "", "price": 1000}))
                .collect(),
        );
        store.seed(collections::ACCOUNTS, accounts(None));

        let clock = Arc::new(ManualClock::at(T0));
        let ledger = Arc::new(InventoryLedger::load(store.clone()).await.unwrap());
        let orders = Arc::new(OrderBook::new(store.clone(), clock.clone()));
        Self {
            store,
            gateway: Arc::new(ScriptedGateway::new()),
            clock,
            ledger,
            orders,
            board: Arc::new(ProgressBoard::new()),
        }
    }

    pub fn pin_address(&self, address: &str) {
        self.store.seed(collections::ACCOUNTS, accounts(Some(address)));
    }

    pub fn matcher(&self, policy: SelectionPolicy) -> Matcher {
        Matcher::with_seed(self.ledger.clone(), self.clock.clone(), policy, 7)
    }

    pub fn release(&self) -> ReleaseCoordinator {
        ReleaseCoordinator::new(self.ledger.clone())
    }

    pub fn accounts(&self) -> AccountDirectory {
        AccountDirectory::new(self.store.clone())
    }

    pub fn market(&self) -> MarketplaceClient {
        MarketplaceClient::new(self.gateway.clone())
    }

    pub fn settlement(&self) -> Settlement {
        Settlement::new(self.orders.clone(), Arc::new(self.release()), self.board.clone())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator {
            accounts: self.accounts(),
            matcher: Arc::new(self.matcher(SelectionPolicy::Random)),
            ledger: self.ledger.clone(),
            release: Arc::new(self.release()),
            orders: self.orders.clone(),
            market: self.market(),
            deep_links: DeepLinkExtractor::new("alipays").unwrap(),
            amount_policy: Arc::new(AcceptAny),
            board: self.board.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn poller(&self) -> StatusPoller {
        StatusPoller::new(self.accounts(), self.market(), Arc::new(self.settlement()))
    }

    pub fn sweeper(&self, default_validity: Duration) -> ExpirySweeper {
        ExpirySweeper::new(
            self.store.clone(),
            self.accounts(),
            self.market(),
            Arc::new(self.settlement()),
            self.ledger.clone(),
            self.clock.clone(),
            default_validity,
        )
    }

    /// Steps 1-4 succeed.
    pub fn script_until_payment(&self, external_ref: &str) {
        self.gateway
            .push_ok(targets::UPDATE_PRICE, json!({}))
            .push_ok(targets::ADDRESSES, json!({"addresses": [{"id": "addr-1", "label": "home"}]}))
            .push_ok(
                targets::CREATE_ORDER,
                json!({"orderId": external_ref, "paySessionId": format!("ps-{external_ref}")}),
            )
            .push_ok(targets::CASHIER_SESSION, json!({"redirectUrl": REDIRECT_URL}));
    }

    /// All five steps succeed.
    pub fn script_happy_path(&self, external_ref: &str) {
        self.script_until_payment(external_ref);
        self.gateway.push_ok(REDIRECT_URL, json!(PAGE_WITH_LINK));
    }

    /// Lock `item` and persist a pending order for it, created now.
    pub async fn place_pending(&self, item: &str) -> Order {
        let ticket = self.lock(item).await;
        let order = Order::pending(PlacedOrder {
            id: OrderId::new(),
            external_ref: format!("ext-{item}"),
            pay_session_id: None,
            buyer_id: AccountId::new("b1"),
            inventory_id: ItemId::new(item),
            seller_id: AccountId::new("s1"),
            amount: Money::from_minor(29800),
            lock_ticket: ticket,
            payment_url: REDIRECT_URL.to_string(),
            created_at_ms: self.clock.now_ms(),
        });
        self.orders.insert(order.clone()).await.unwrap();
        order
    }

    /// Pending order as written by older versions: no buyer, no ticket.
    pub async fn place_legacy_pending(&self, item: &str) -> Order {
        self.lock(item).await;
        let order: Order = serde_json::from_value(json!({
            "id": OrderId::new().to_string(),
            "inventoryId": item,
            "sellerId": "s1",
            "amount": 29800,
            "status": "pending",
            "createdAtMs": self.clock.now_ms(),
        }))
        .unwrap();
        self.orders.insert(order.clone()).await.unwrap();
        order
    }

    async fn lock(&self, item: &str) -> LockTicket {
        let ticket = LockTicket::new();
        let now_ms = self.clock.now_ms();
        let id = ItemId::new(item);
        self.ledger
            .mutate(|items| Ok(items.get_mut(&id).unwrap().occupy(ticket, now_ms)?))
            .await
            .unwrap();
        ticket
    }
}
