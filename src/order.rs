//! # Order Module
//!
//! Persisted order records, the payload sent to the operator, and the
//! actions an operator may take on a pending order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of an order. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "fulfilled" => Ok(OrderStatus::Fulfilled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// Opaque customer identity as seen by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

/// How the order reaches the customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FulfillmentInfo {
    Pickup {
        location_id: String,
        location_name: String,
    },
    Delivery {
        address: String,
    },
}

impl FulfillmentInfo {
    pub fn location_id(&self) -> Option<&str> {
        match self {
            FulfillmentInfo::Pickup { location_id, .. } => Some(location_id),
            FulfillmentInfo::Delivery { .. } => None,
        }
    }

    pub fn is_delivery(&self) -> bool {
        matches!(self, FulfillmentInfo::Delivery { .. })
    }

    /// Store name or delivery address
    pub fn destination(&self) -> &str {
        match self {
            FulfillmentInfo::Pickup { location_name, .. } => location_name,
            FulfillmentInfo::Delivery { address } => address,
        }
    }
}

/// Where the operator notification was posted, for later retraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationHandle {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub customer: CustomerRef,
    pub fulfillment: FulfillmentInfo,
    pub collection_id: String,
    pub collection_name: String,
    pub item_id: String,
    pub item_name: String,
    pub base_price: Decimal,
    pub discount_percent: u8,
    pub total: Decimal,
    pub status: OrderStatus,
    pub notification: Option<NotificationHandle>,
}

impl Order {
    /// Number shown to customers and operators
    pub fn number(&self) -> String {
        short_number(&self.id)
    }

    /// Build the operator payload for this order
    pub fn notification(&self, operator_chat_id: Option<i64>) -> OperatorNotification {
        OperatorNotification {
            order_id: self.id,
            number: self.number(),
            timestamp: self.created_at,
            customer: self.customer.clone(),
            items: vec![OrderLine {
                collection: self.collection_name.clone(),
                item: self.item_name.clone(),
            }],
            fulfillment: self.fulfillment.clone(),
            discount_percent: self.discount_percent,
            total: self.total,
            operator_chat_id,
        }
    }
}

pub fn short_number(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub collection: String,
    pub item: String,
}

/// Everything an operator needs to handle an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorNotification {
    pub order_id: Uuid,
    pub number: String,
    pub timestamp: DateTime<Utc>,
    pub customer: CustomerRef,
    pub items: Vec<OrderLine>,
    pub fulfillment: FulfillmentInfo,
    pub discount_percent: u8,
    pub total: Decimal,
    /// Explicit recipient; the notifier's default chat is used when `None`
    pub operator_chat_id: Option<i64>,
}

/// Apply a percentage discount, rounded to cents
pub fn apply_discount(base: Decimal, percent: u8) -> Decimal {
    let percent = Decimal::from(percent.min(100));
    (base * (Decimal::ONE_HUNDRED - percent) / Decimal::ONE_HUNDRED).round_dp(2)
}

/// Buttons on an operator notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAction {
    Fulfil(Uuid),
    Cancel(Uuid),
}

impl OperatorAction {
    pub fn token(&self) -> String {
        match self {
            OperatorAction::Fulfil(id) => format!("op:fulfil:{id}"),
            OperatorAction::Cancel(id) => format!("op:cancel:{id}"),
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        let rest = token.strip_prefix("op:")?;
        let (verb, id) = rest.split_once(':')?;
        let id = Uuid::parse_str(id).ok()?;
        match verb {
            "fulfil" => Some(OperatorAction::Fulfil(id)),
            "cancel" => Some(OperatorAction::Cancel(id)),
            _ => None,
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OperatorAction::Fulfil(id) | OperatorAction::Cancel(id) => *id,
        }
    }

    pub fn target_status(&self) -> OrderStatus {
        match self {
            OperatorAction::Fulfil(_) => OrderStatus::Fulfilled,
            OperatorAction::Cancel(_) => OrderStatus::Cancelled,
        }
    }
}
