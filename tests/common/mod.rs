//! Shared fixtures for integration tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use shopbot::engine::{ConversationEngine, Turn};
use shopbot::errors::StoreError;
use shopbot::events::Event;
use shopbot::dialogue::Session;
use shopbot::finalizer::OrderFinalizer;
use shopbot::inventory::{LocationDelivery, SupplyBatch};
use shopbot::notify::Notifier;
use shopbot::order::{CustomerRef, NotificationHandle, OperatorNotification, Order, OrderStatus};
use shopbot::referral::ReferralLedger;
use shopbot::shop_config::ShopConfig;
use shopbot::store::{MemoryStore, OrderStore, StoreResult, SupplyStore};

pub const MANAGER_CHAT: i64 = 100;
pub const CENTRAL_OPERATOR: i64 = 200;

pub const CONFIG_JSON: &str = r#"{
    "manager_chat_id": 100,
    "branding": {"shop_name": "Cloud Shop", "currency_symbol": "€"},
    "catalog": {
        "locations": [
            {"id": "central", "name": "Central", "operator_chat_id": 200},
            {"id": "north", "name": "North"}
        ],
        "collections": [
            {"id": "classic", "name": "Classic", "product_type": "Liquid", "price": 25,
             "description": "Smooth everyday blends",
             "items": [{"id": "mint", "name": "Mint"}, {"id": "mango", "name": "Mango"}]},
            {"id": "frost", "name": "Frost", "product_type": "Liquid", "price": 30,
             "items": [{"id": "ice", "name": "Ice"}]},
            {"id": "pods", "name": "Pods", "product_type": "Pods", "price": 15,
             "items": [{"id": "berry", "name": "Berry"}]},
            {"id": "empty", "name": "Coming soon", "product_type": "Liquid", "price": 20}
        ]
    },
    "follow_up": {"enabled": false}
}"#;

pub fn config() -> ShopConfig {
    ShopConfig::from_json(CONFIG_JSON).expect("fixture config should be valid")
}

pub fn customer(user_id: i64) -> CustomerRef {
    CustomerRef {
        user_id,
        username: Some(format!("user{user_id}")),
        full_name: format!("Customer {user_id}"),
    }
}

/// Notifier double that records what would have been sent
#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<OperatorNotification>>,
    pub follow_ups: Mutex<Vec<(i64, String)>>,
    pub fail_operator: AtomicBool,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<OperatorNotification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn follow_ups(&self) -> Vec<(i64, String)> {
        self.follow_ups.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_operator(&self, notification: &OperatorNotification) -> Result<NotificationHandle> {
        if self.fail_operator.load(Ordering::SeqCst) {
            return Err(anyhow!("operator chat unreachable"));
        }
        let mut sent = self.notifications.lock().unwrap();
        sent.push(notification.clone());
        Ok(NotificationHandle {
            chat_id: notification.operator_chat_id.unwrap_or(MANAGER_CHAT),
            message_id: sent.len() as i32,
        })
    }

    async fn send_follow_up(&self, user_id: i64, text: String) -> Result<()> {
        self.follow_ups.lock().unwrap().push((user_id, text));
        Ok(())
    }
}

/// Order store that can be told to reject writes
pub struct FlakyOrders {
    pub inner: Arc<MemoryStore>,
    pub fail_writes: AtomicBool,
}

#[async_trait]
impl OrderStore for FlakyOrders {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("orders table locked".into()));
        }
        self.inner.insert_order(order).await
    }

    async fn attach_notification(&self, order_id: Uuid, handle: NotificationHandle) -> StoreResult<()> {
        self.inner.attach_notification(order_id, handle).await
    }

    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>> {
        self.inner.set_status(order_id, status).await
    }

    async fn order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        self.inner.order(order_id).await
    }

    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        self.inner.orders_by_user(user_id).await
    }

    async fn fulfilled_orders(&self) -> StoreResult<Vec<Order>> {
        self.inner.fulfilled_orders().await
    }
}

pub struct Harness {
    pub engine: ConversationEngine,
    pub store: Arc<MemoryStore>,
    pub orders: Arc<FlakyOrders>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: ShopConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let orders = Arc::new(FlakyOrders {
            inner: Arc::clone(&store),
            fail_writes: AtomicBool::new(false),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let finalizer = OrderFinalizer::new(
            orders.clone(),
            store.clone(),
            ReferralLedger::new(store.clone()),
            notifier.clone(),
        );
        let engine = ConversationEngine::new(Arc::new(config), finalizer);
        Self {
            engine,
            store,
            orders,
            notifier,
        }
    }

    /// Record one supply batch of `(location, item, quantity)` entries
    pub async fn stock(&self, entries: &[(&str, &str, u32)]) -> Result<()> {
        let mut deliveries: BTreeMap<&str, BTreeMap<String, u32>> = BTreeMap::new();
        for (location, item, quantity) in entries {
            deliveries
                .entry(*location)
                .or_default()
                .insert(item.to_string(), *quantity);
        }
        let batch = SupplyBatch::new(
            deliveries
                .into_iter()
                .map(|(location_id, quantities)| LocationDelivery {
                    location_id: location_id.to_string(),
                    quantities,
                })
                .collect(),
        );
        self.store.record_batch(&batch).await?;
        Ok(())
    }

    /// Register a user and grant a discount
    pub async fn with_discount(&self, user_id: i64, percent: u8) -> Result<()> {
        self.engine
            .finalizer()
            .ledger()
            .register(user_id, None)
            .await?;
        assert!(self.store.set_discount(user_id, percent));
        Ok(())
    }

    pub async fn send(&self, user_id: i64, event: Event, session: Session) -> Turn {
        self.engine
            .handle(&customer(user_id), None, event, session)
            .await
    }

    /// Send a chain of events starting from a fresh session
    pub async fn walk(&self, user_id: i64, events: Vec<Event>) -> Turn {
        let mut session = Session::default();
        let mut last = None;
        for event in events {
            let turn = self.send(user_id, event, session).await;
            session = turn.session.clone();
            last = Some(turn);
        }
        last.expect("walk needs at least one event")
    }

    pub async fn stored_orders(&self, user_id: i64) -> Vec<Order> {
        self.store.orders_by_user(user_id).await.unwrap()
    }
}
