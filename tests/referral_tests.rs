//! Referral ledger and in-memory store behaviour

use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use shopbot::order::{CustomerRef, FulfillmentInfo, NotificationHandle, Order, OrderStatus};
use shopbot::referral::ReferralLedger;
use shopbot::store::{MemoryStore, OrderStore, ReferralStore};

fn ledger() -> (ReferralLedger, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (ReferralLedger::new(store.clone()), store)
}

fn pending_order(user_id: i64) -> Order {
    Order {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        customer: CustomerRef {
            user_id,
            username: None,
            full_name: "Alex".into(),
        },
        fulfillment: FulfillmentInfo::Delivery {
            address: "Main St 5".into(),
        },
        collection_id: "classic".into(),
        collection_name: "Classic".into(),
        item_id: "mint".into(),
        item_name: "Mint".into(),
        base_price: Decimal::from(25),
        discount_percent: 0,
        total: Decimal::from(25),
        status: OrderStatus::Pending,
        notification: None,
    }
}

#[tokio::test]
async fn test_register_is_idempotent() -> Result<()> {
    let (ledger, _) = ledger();

    let first = ledger.register(1, None).await?;
    let second = ledger.register(1, Some("SOMECODE")).await?;
    assert_eq!(first, second);
    assert_eq!(second.referrer_code, None);
    Ok(())
}

#[tokio::test]
async fn test_referrer_code_is_recorded() -> Result<()> {
    let (ledger, _) = ledger();

    let referrer = ledger.register(1, None).await?;
    let referred = ledger
        .register(2, Some(&referrer.code.to_lowercase()))
        .await?;
    assert_eq!(referred.referrer_code, Some(referrer.code.clone()));
    assert_ne!(referred.code, referrer.code);
    Ok(())
}

#[tokio::test]
async fn test_unknown_referrer_code_is_dropped() -> Result<()> {
    let (ledger, _) = ledger();

    let account = ledger.register(3, Some("NOPE1234")).await?;
    assert_eq!(account.referrer_code, None);
    assert_eq!(ledger.get_discount(3).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_consume_discount_only_once() -> Result<()> {
    let (ledger, store) = ledger();
    ledger.register(4, None).await?;
    assert!(store.set_discount(4, 30));

    let (a, b) = tokio::join!(ledger.consume_discount(4), ledger.consume_discount(4));
    let mut taken = vec![a?, b?];
    taken.sort();
    assert_eq!(taken, vec![0, 30]);
    assert_eq!(ledger.get_discount(4).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_discounts_of_different_users_are_independent() -> Result<()> {
    let (ledger, store) = ledger();
    ledger.register(5, None).await?;
    ledger.register(6, None).await?;
    store.set_discount(5, 10);
    store.set_discount(6, 20);

    assert_eq!(ledger.consume_discount(5).await?, 10);
    assert_eq!(ledger.get_discount(6).await?, 20);
    Ok(())
}

#[tokio::test]
async fn test_restore_discount_is_capped() -> Result<()> {
    let (ledger, store) = ledger();
    ledger.register(7, None).await?;
    store.set_discount(7, 40);

    ledger.restore_discount(7, 30).await?;
    assert_eq!(ledger.get_discount(7).await?, 50);
    assert!(!store.set_discount(8, 10));
    Ok(())
}

#[tokio::test]
async fn test_status_changes_exactly_once() -> Result<()> {
    let store = MemoryStore::new();
    let order = pending_order(9);
    store.insert_order(&order).await?;
    store
        .attach_notification(
            order.id,
            NotificationHandle {
                chat_id: 100,
                message_id: 42,
            },
        )
        .await?;

    let fulfilled = store.set_status(order.id, OrderStatus::Fulfilled).await?;
    assert_eq!(fulfilled.map(|o| o.status), Some(OrderStatus::Fulfilled));
    assert!(store
        .set_status(order.id, OrderStatus::Cancelled)
        .await?
        .is_none());

    let stored = store.order(order.id).await?.unwrap();
    assert_eq!(stored.status, OrderStatus::Fulfilled);
    assert_eq!(stored.notification.map(|n| n.message_id), Some(42));
    assert_eq!(store.fulfilled_orders().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_order_is_a_conflict() -> Result<()> {
    let store = MemoryStore::new();
    let order = pending_order(10);
    store.insert_order(&order).await?;
    assert!(matches!(
        store.insert_order(&order).await,
        Err(shopbot::errors::StoreError::Conflict(_))
    ));
    assert!(store.find_by_code("missing").await?.is_none());
    Ok(())
}
