//! # Database Module
//!
//! PostgreSQL implementation of the order, supply and referral stores.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::inventory::{LocationDelivery, SupplyBatch};
use crate::order::{CustomerRef, FulfillmentInfo, NotificationHandle, Order, OrderStatus};
use crate::referral::{ReferralAccount, MAX_DISCOUNT};
use crate::store::{OrderStore, ReferralStore, StoreResult, SupplyStore};

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS orders (
            id UUID PRIMARY KEY,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            user_id BIGINT NOT NULL,
            username TEXT,
            full_name TEXT NOT NULL,
            fulfillment TEXT NOT NULL CHECK (fulfillment IN ('pickup', 'delivery')),
            location_id TEXT,
            location_name TEXT,
            address TEXT,
            collection_id TEXT NOT NULL,
            collection_name TEXT NOT NULL,
            item_id TEXT NOT NULL,
            item_name TEXT NOT NULL,
            base_price NUMERIC(12, 2) NOT NULL,
            discount_percent SMALLINT NOT NULL DEFAULT 0,
            total NUMERIC(12, 2) NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'fulfilled', 'cancelled')),
            notify_chat_id BIGINT,
            notify_message_id INTEGER
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create orders table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS orders_user_id_idx ON orders(user_id)")
        .execute(pool)
        .await
        .context("Failed to create orders user index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS orders_status_idx ON orders(status)")
        .execute(pool)
        .await
        .context("Failed to create orders status index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS supply_deliveries (
            id BIGSERIAL PRIMARY KEY,
            batch_id UUID NOT NULL,
            received_at TIMESTAMPTZ NOT NULL,
            location_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 0)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create supply_deliveries table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS referral_accounts (
            user_id BIGINT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            referrer_code TEXT,
            total_referrals INTEGER NOT NULL DEFAULT 0,
            discount_percent SMALLINT NOT NULL DEFAULT 0
                CHECK (discount_percent BETWEEN 0 AND 50),
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create referral_accounts table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

const ORDER_COLUMNS: &str = "id, created_at, user_id, username, full_name, fulfillment, \
    location_id, location_name, address, collection_id, collection_name, item_id, item_name, \
    base_price, discount_percent, total, status, notify_chat_id, notify_message_id";

const REFERRAL_COLUMNS: &str =
    "user_id, code, referrer_code, total_referrals, discount_percent, created_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    user_id: i64,
    username: Option<String>,
    full_name: String,
    fulfillment: String,
    location_id: Option<String>,
    location_name: Option<String>,
    address: Option<String>,
    collection_id: String,
    collection_name: String,
    item_id: String,
    item_name: String,
    base_price: Decimal,
    discount_percent: i16,
    total: Decimal,
    status: String,
    notify_chat_id: Option<i64>,
    notify_message_id: Option<i32>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> StoreResult<Self> {
        let corrupt = |what: &str| StoreError::Corrupt(format!("order {}: {what}", row.id));

        let fulfillment = match row.fulfillment.as_str() {
            "pickup" => FulfillmentInfo::Pickup {
                location_id: row.location_id.clone().ok_or_else(|| corrupt("missing location"))?,
                location_name: row.location_name.clone().unwrap_or_default(),
            },
            "delivery" => FulfillmentInfo::Delivery {
                address: row.address.clone().ok_or_else(|| corrupt("missing address"))?,
            },
            other => return Err(corrupt(&format!("unknown fulfillment '{other}'"))),
        };
        let status = row.status.parse::<OrderStatus>().map_err(|e| corrupt(&e))?;
        let discount_percent =
            u8::try_from(row.discount_percent).map_err(|_| corrupt("discount out of range"))?;
        let notification = match (row.notify_chat_id, row.notify_message_id) {
            (Some(chat_id), Some(message_id)) => Some(NotificationHandle {
                chat_id,
                message_id,
            }),
            _ => None,
        };

        Ok(Order {
            id: row.id,
            created_at: row.created_at,
            customer: CustomerRef {
                user_id: row.user_id,
                username: row.username,
                full_name: row.full_name,
            },
            fulfillment,
            collection_id: row.collection_id,
            collection_name: row.collection_name,
            item_id: row.item_id,
            item_name: row.item_name,
            base_price: row.base_price,
            discount_percent,
            total: row.total,
            status,
            notification,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReferralRow {
    user_id: i64,
    code: String,
    referrer_code: Option<String>,
    total_referrals: i32,
    discount_percent: i16,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReferralRow> for ReferralAccount {
    type Error = StoreError;

    fn try_from(row: ReferralRow) -> StoreResult<Self> {
        Ok(ReferralAccount {
            user_id: row.user_id,
            code: row.code,
            referrer_code: row.referrer_code,
            total_referrals: u32::try_from(row.total_referrals).unwrap_or(0),
            discount_percent: discount_from_db(row.discount_percent, row.user_id)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SupplyRow {
    batch_id: Uuid,
    received_at: DateTime<Utc>,
    location_id: String,
    item_id: String,
    quantity: i32,
}

fn discount_from_db(value: i16, user_id: i64) -> StoreResult<u8> {
    u8::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("discount {value} for user {user_id}")))
}

fn map_unique_violation(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(what.to_string())
        }
        _ => StoreError::Database(e),
    }
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        init_database_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let (kind, location_id, location_name, address) = match &order.fulfillment {
            FulfillmentInfo::Pickup {
                location_id,
                location_name,
            } => ("pickup", Some(location_id), Some(location_name), None),
            FulfillmentInfo::Delivery { address } => ("delivery", None, None, Some(address)),
        };

        sqlx::query(
            "INSERT INTO orders (id, created_at, user_id, username, full_name, fulfillment,
                location_id, location_name, address, collection_id, collection_name, item_id,
                item_name, base_price, discount_percent, total, status, notify_chat_id,
                notify_message_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
        )
        .bind(order.id)
        .bind(order.created_at)
        .bind(order.customer.user_id)
        .bind(&order.customer.username)
        .bind(&order.customer.full_name)
        .bind(kind)
        .bind(location_id)
        .bind(location_name)
        .bind(address)
        .bind(&order.collection_id)
        .bind(&order.collection_name)
        .bind(&order.item_id)
        .bind(&order.item_name)
        .bind(order.base_price)
        .bind(i16::from(order.discount_percent))
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(order.notification.map(|n| n.chat_id))
        .bind(order.notification.map(|n| n.message_id))
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("order {} already exists", order.id)))?;

        debug!(order_id = %order.id, "Order row inserted");
        Ok(())
    }

    async fn attach_notification(
        &self,
        order_id: Uuid,
        handle: NotificationHandle,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET notify_chat_id = $1, notify_message_id = $2 WHERE id = $3",
        )
        .bind(handle.chat_id)
        .bind(handle.message_id)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {order_id}")));
        }
        Ok(())
    }

    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET status = $1 WHERE id = $2 AND status = 'pending' RETURNING {ORDER_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Order::try_from).transpose()
    }

    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn fulfilled_orders(&self) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = 'fulfilled' ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }
}

#[async_trait]
impl SupplyStore for PgStore {
    async fn record_batch(&self, batch: &SupplyBatch) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for delivery in &batch.deliveries {
            for (item_id, quantity) in &delivery.quantities {
                let quantity = i32::try_from(*quantity).map_err(|_| {
                    StoreError::Corrupt(format!("quantity {quantity} of {item_id} too large"))
                })?;
                sqlx::query(
                    "INSERT INTO supply_deliveries (batch_id, received_at, location_id, item_id, quantity)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(batch.id)
                .bind(batch.received_at)
                .bind(&delivery.location_id)
                .bind(item_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        info!(batch_id = %batch.id, units = batch.total_units(), "Supply batch recorded");
        Ok(())
    }

    async fn supply_batches(&self) -> StoreResult<Vec<SupplyBatch>> {
        let rows: Vec<SupplyRow> = sqlx::query_as(
            "SELECT batch_id, received_at, location_id, item_id, quantity
             FROM supply_deliveries
             ORDER BY received_at, batch_id, location_id, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut batches: Vec<SupplyBatch> = Vec::new();
        for row in rows {
            let quantity = u32::try_from(row.quantity).map_err(|_| {
                StoreError::Corrupt(format!("negative quantity in batch {}", row.batch_id))
            })?;

            if batches.last().map(|b| b.id) != Some(row.batch_id) {
                batches.push(SupplyBatch {
                    id: row.batch_id,
                    received_at: row.received_at,
                    deliveries: Vec::new(),
                });
            }
            let Some(batch) = batches.last_mut() else {
                continue;
            };

            if batch.deliveries.last().map(|d| d.location_id.as_str()) != Some(row.location_id.as_str()) {
                batch.deliveries.push(LocationDelivery {
                    location_id: row.location_id.clone(),
                    quantities: BTreeMap::new(),
                });
            }
            if let Some(delivery) = batch.deliveries.last_mut() {
                let slot = delivery.quantities.entry(row.item_id).or_insert(0);
                *slot = slot.saturating_add(quantity);
            }
        }

        Ok(batches)
    }
}

#[async_trait]
impl ReferralStore for PgStore {
    async fn insert_if_absent(&self, account: ReferralAccount) -> StoreResult<ReferralAccount> {
        let inserted: Option<ReferralRow> = sqlx::query_as(&format!(
            "INSERT INTO referral_accounts (user_id, code, referrer_code, total_referrals, discount_percent, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id) DO NOTHING
             RETURNING {REFERRAL_COLUMNS}"
        ))
        .bind(account.user_id)
        .bind(&account.code)
        .bind(&account.referrer_code)
        .bind(i32::try_from(account.total_referrals).unwrap_or(i32::MAX))
        .bind(i16::from(account.discount_percent))
        .bind(account.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("referral code {} taken", account.code)))?;

        if let Some(row) = inserted {
            return ReferralAccount::try_from(row);
        }

        self.account(account.user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("referral account {}", account.user_id)))
    }

    async fn account(&self, user_id: i64) -> StoreResult<Option<ReferralAccount>> {
        let row: Option<ReferralRow> = sqlx::query_as(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referral_accounts WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReferralAccount::try_from).transpose()
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<ReferralAccount>> {
        let row: Option<ReferralRow> = sqlx::query_as(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referral_accounts WHERE code = $1"
        ))
        .bind(code.to_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReferralAccount::try_from).transpose()
    }

    async fn take_discount(&self, user_id: i64) -> StoreResult<u8> {
        // Row lock makes concurrent takes for one user consume the discount once
        let previous: Option<(i16,)> = sqlx::query_as(
            "WITH prev AS (
                SELECT user_id, discount_percent FROM referral_accounts
                WHERE user_id = $1 FOR UPDATE
             )
             UPDATE referral_accounts r SET discount_percent = 0
             FROM prev WHERE r.user_id = prev.user_id
             RETURNING prev.discount_percent",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match previous {
            Some((value,)) => discount_from_db(value, user_id),
            None => Ok(0),
        }
    }

    async fn restore_discount(&self, user_id: i64, percent: u8) -> StoreResult<()> {
        sqlx::query(
            "UPDATE referral_accounts
             SET discount_percent = LEAST($2, discount_percent + $1)
             WHERE user_id = $3",
        )
        .bind(i16::from(percent))
        .bind(i16::from(MAX_DISCOUNT))
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
