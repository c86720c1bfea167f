//! # Order Finalizer Module
//!
//! Turns a completed selection into a persisted order, consumes the referral
//! discount when the customer accepted it, alerts the operator and schedules
//! the follow-up message.
//!
//! The discount is taken before the order is written so that two concurrent
//! finalizations for one user cannot both receive it. If the write fails the
//! discount is given back. A failed operator notification does not undo the
//! order; it stays pending for manual follow-up.

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, Collection, Item};
use crate::dialogue::{FulfillmentKind, Session};
use crate::errors::{Result, ShopError};
use crate::inventory::{resolve, Inventory};
use crate::localization::t_args_lang;
use crate::notify::{schedule_follow_up, Notifier};
use crate::order::{apply_discount, CustomerRef, FulfillmentInfo, Order, OrderStatus};
use crate::referral::ReferralLedger;
use crate::shop_config::ShopConfig;
use crate::store::{OrderStore, StoreResult, SupplyStore};

/// Catalog entries and fulfillment a session points at
#[derive(Debug, Clone)]
pub struct ResolvedSelection<'a> {
    pub collection: &'a Collection,
    pub item: &'a Item,
    pub fulfillment: FulfillmentInfo,
}

/// Look up everything a completed session refers to
pub fn resolve_selection<'a>(catalog: &'a Catalog, session: &Session) -> Result<ResolvedSelection<'a>> {
    let missing = || ShopError::MissingContext(session.step.name().to_string());

    let collection_id = session.collection_id.as_deref().ok_or_else(missing)?;
    let item_id = session.item_id.as_deref().ok_or_else(missing)?;
    let collection = catalog
        .collection(collection_id)
        .ok_or_else(|| ShopError::not_found("collection", collection_id))?;
    let item = collection
        .item(item_id)
        .ok_or_else(|| ShopError::not_found("item", item_id))?;

    let fulfillment = match session.fulfillment.ok_or_else(missing)? {
        FulfillmentKind::Pickup => {
            let location_id = session.location_id.as_deref().ok_or_else(missing)?;
            let location = catalog
                .location(location_id)
                .ok_or_else(|| ShopError::not_found("location", location_id))?;
            FulfillmentInfo::Pickup {
                location_id: location.id.clone(),
                location_name: location.name.clone(),
            }
        }
        FulfillmentKind::Delivery => FulfillmentInfo::Delivery {
            address: session.address.clone().ok_or_else(missing)?,
        },
    };

    Ok(ResolvedSelection {
        collection,
        item,
        fulfillment,
    })
}

/// Outcome of a successful finalization
#[derive(Debug)]
pub struct Receipt {
    pub order: Order,
    /// Whether the operator notification went out
    pub notified: bool,
    pub follow_up: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct OrderFinalizer {
    orders: Arc<dyn OrderStore>,
    supply: Arc<dyn SupplyStore>,
    ledger: ReferralLedger,
    notifier: Arc<dyn Notifier>,
}

impl OrderFinalizer {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        supply: Arc<dyn SupplyStore>,
        ledger: ReferralLedger,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orders,
            supply,
            ledger,
            notifier,
        }
    }

    pub fn ledger(&self) -> &ReferralLedger {
        &self.ledger
    }

    pub fn orders(&self) -> &Arc<dyn OrderStore> {
        &self.orders
    }

    pub fn supply(&self) -> &Arc<dyn SupplyStore> {
        &self.supply
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Recompute stock from the current supply batches and fulfilled orders
    pub async fn current_inventory(&self, catalog: &Catalog) -> StoreResult<Inventory> {
        let batches = self.supply.supply_batches().await?;
        let fulfilled = self.orders.fulfilled_orders().await?;
        Ok(resolve(catalog, &batches, &fulfilled))
    }

    /// Fail with `OutOfStock` unless the session's item can currently be sourced
    pub async fn ensure_available(&self, catalog: &Catalog, session: &Session, item_id: &str) -> Result<()> {
        let sourcing = session
            .sourcing()
            .ok_or_else(|| ShopError::MissingContext(session.step.name().to_string()))?;
        let inventory = self.current_inventory(catalog).await?;
        if inventory.is_available(item_id, sourcing) {
            Ok(())
        } else {
            Err(ShopError::OutOfStock(item_id.to_string()))
        }
    }

    /// Create the order for a completed session
    pub async fn finalize(
        &self,
        config: &ShopConfig,
        session: &Session,
        customer: &CustomerRef,
        apply_discount_choice: bool,
        language_code: Option<&str>,
    ) -> Result<Receipt> {
        let selection = resolve_selection(&config.catalog, session)?;
        self.ensure_available(&config.catalog, session, &selection.item.id)
            .await?;

        let user_id = customer.user_id;
        let discount_percent = if apply_discount_choice {
            self.ledger.consume_discount(user_id).await?
        } else {
            0
        };

        let base_price = selection.collection.price;
        let mut order = Order {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            customer: customer.clone(),
            fulfillment: selection.fulfillment,
            collection_id: selection.collection.id.clone(),
            collection_name: selection.collection.name.clone(),
            item_id: selection.item.id.clone(),
            item_name: selection.item.name.clone(),
            base_price,
            discount_percent,
            total: apply_discount(base_price, discount_percent),
            status: OrderStatus::Pending,
            notification: None,
        };

        if let Err(e) = self.orders.insert_order(&order).await {
            error!(user_id, order_id = %order.id, error = %e, "Failed to persist order");
            if let Err(restore_err) = self.ledger.restore_discount(user_id, discount_percent).await {
                error!(user_id, error = %restore_err, "Failed to restore discount");
            }
            return Err(e.into());
        }

        info!(
            user_id,
            order_id = %order.id,
            number = %order.number(),
            total = %order.total,
            discount = discount_percent,
            "Order created"
        );

        let operator_chat = config.operator_chat_for(order.fulfillment.location_id());
        let notified = match self
            .notifier
            .notify_operator(&order.notification(Some(operator_chat)))
            .await
        {
            Ok(handle) => {
                if let Err(e) = self.orders.attach_notification(order.id, handle).await {
                    warn!(order_id = %order.id, error = %e, "Failed to store notification handle");
                }
                order.notification = Some(handle);
                true
            }
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Failed to notify operator");
                false
            }
        };

        let follow_up = config.follow_up.enabled.then(|| {
            let text = t_args_lang(
                "follow-up-message",
                &[("number", &order.number())],
                language_code,
            );
            schedule_follow_up(
                Arc::clone(&self.notifier),
                user_id,
                text,
                config.follow_up.random_delay(),
            )
        });

        Ok(Receipt {
            order,
            notified,
            follow_up,
        })
    }
}
