//! # Store Module
//!
//! Persistence seams of the ordering core and an in-process implementation.
//! The PostgreSQL implementation lives in [`crate::db`].

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::inventory::SupplyBatch;
use crate::order::{NotificationHandle, Order, OrderStatus};
use crate::referral::ReferralAccount;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;

    async fn attach_notification(&self, order_id: Uuid, handle: NotificationHandle)
        -> StoreResult<()>;

    /// Move a pending order to `status`. Returns the updated order, or `None`
    /// when the order does not exist or already left `Pending`.
    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>>;

    async fn order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>>;

    /// Fulfilled orders, oldest first
    async fn fulfilled_orders(&self) -> StoreResult<Vec<Order>>;
}

#[async_trait]
pub trait SupplyStore: Send + Sync {
    async fn record_batch(&self, batch: &SupplyBatch) -> StoreResult<()>;

    /// All batches, oldest first
    async fn supply_batches(&self) -> StoreResult<Vec<SupplyBatch>>;
}

/// Record store behind the referral ledger; every method is atomic per user
#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// Insert `account` unless the user already has one; returns the stored account
    async fn insert_if_absent(&self, account: ReferralAccount) -> StoreResult<ReferralAccount>;

    async fn account(&self, user_id: i64) -> StoreResult<Option<ReferralAccount>>;

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<ReferralAccount>>;

    /// Zero the user's discount and return what it was
    async fn take_discount(&self, user_id: i64) -> StoreResult<u8>;

    /// Give back a discount taken by a finalization that failed to persist
    async fn restore_discount(&self, user_id: i64, percent: u8) -> StoreResult<()>;
}

/// In-process store used when no database is configured, and in tests
#[derive(Default)]
pub struct MemoryStore {
    orders: RwLock<Vec<Order>>,
    batches: RwLock<Vec<SupplyBatch>>,
    referrals: DashMap<i64, ReferralAccount>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's discount directly. Crediting referrals happens outside the bot.
    pub fn set_discount(&self, user_id: i64, percent: u8) -> bool {
        match self.referrals.get_mut(&user_id) {
            Some(mut account) => {
                account.discount_percent = crate::referral::clamp_discount(percent);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        if orders.iter().any(|existing| existing.id == order.id) {
            return Err(StoreError::Conflict(format!("order {}", order.id)));
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn attach_notification(
        &self,
        order_id: Uuid,
        handle: NotificationHandle,
    ) -> StoreResult<()> {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        let order = orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        order.notification = Some(handle);
        Ok(())
    }

    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>> {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        Ok(orders
            .iter_mut()
            .find(|order| order.id == order_id && order.status == OrderStatus::Pending)
            .map(|order| {
                order.status = status;
                order.clone()
            }))
    }

    async fn order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        Ok(orders.iter().find(|order| order.id == order_id).cloned())
    }

    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        Ok(orders
            .iter()
            .filter(|order| order.customer.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn fulfilled_orders(&self) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        Ok(orders
            .iter()
            .filter(|order| order.status == OrderStatus::Fulfilled)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SupplyStore for MemoryStore {
    async fn record_batch(&self, batch: &SupplyBatch) -> StoreResult<()> {
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.clone());
        Ok(())
    }

    async fn supply_batches(&self) -> StoreResult<Vec<SupplyBatch>> {
        Ok(self
            .batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[async_trait]
impl ReferralStore for MemoryStore {
    async fn insert_if_absent(&self, account: ReferralAccount) -> StoreResult<ReferralAccount> {
        if let Some(existing) = self.referrals.get(&account.user_id) {
            return Ok(existing.clone());
        }
        if self
            .referrals
            .iter()
            .any(|entry| entry.code == account.code)
        {
            return Err(StoreError::Conflict(format!("referral code {}", account.code)));
        }
        Ok(self
            .referrals
            .entry(account.user_id)
            .or_insert(account)
            .clone())
    }

    async fn account(&self, user_id: i64) -> StoreResult<Option<ReferralAccount>> {
        Ok(self.referrals.get(&user_id).map(|entry| entry.clone()))
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<ReferralAccount>> {
        Ok(self
            .referrals
            .iter()
            .find(|entry| entry.code.eq_ignore_ascii_case(code))
            .map(|entry| entry.clone()))
    }

    async fn take_discount(&self, user_id: i64) -> StoreResult<u8> {
        Ok(self
            .referrals
            .get_mut(&user_id)
            .map(|mut account| std::mem::take(&mut account.discount_percent))
            .unwrap_or(0))
    }

    async fn restore_discount(&self, user_id: i64, percent: u8) -> StoreResult<()> {
        let mut account = self
            .referrals
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("referral account {user_id}")))?;
        account.discount_percent =
            crate::referral::clamp_discount(account.discount_percent.saturating_add(percent));
        Ok(())
    }
}
