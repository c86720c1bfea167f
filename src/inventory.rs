//! # Inventory Module
//!
//! Stock is never stored; it is recomputed from supply batches and fulfilled
//! orders every time it is needed. Menus and the operator stock report both go
//! through [`resolve`], so they can never disagree.
//!
//! ## Delivery orders
//!
//! Delivery orders are not tied to a store. When a delivery order is
//! fulfilled it consumes one unit from the catalog's `delivery_source`
//! location if configured, otherwise from the location holding the most
//! stock of that item (first location in catalog order on ties).
//!
//! Delivery availability follows the same rule, so an item is only offered
//! for delivery while the location it would be charged to still holds it.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::catalog::{Catalog, Collection};
use crate::errors::{Result, ShopError};
use crate::order::{Order, OrderStatus};

/// Quantities received by one location in one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDelivery {
    pub location_id: String,
    pub quantities: BTreeMap<String, u32>,
}

/// One supply delivery, possibly spanning several locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyBatch {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub deliveries: Vec<LocationDelivery>,
}

lazy_static! {
    static ref SUPPLY_ENTRY: Regex =
        Regex::new(r"^([\w.-]+)\s*=\s*(\d{1,6})$").expect("Supply entry pattern should be valid");
}

impl SupplyBatch {
    pub fn new(deliveries: Vec<LocationDelivery>) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            deliveries,
        }
    }

    /// Parse operator input of the form `<location> <item>=<qty> ...`
    ///
    /// Both the location and every item must exist in the catalog. Repeated
    /// items are summed.
    pub fn parse_command(input: &str, catalog: &Catalog) -> Result<Self> {
        let mut tokens = input.split_whitespace();
        let location_id = tokens
            .next()
            .ok_or_else(|| ShopError::InvalidInput("missing location".to_string()))?;

        if catalog.location(location_id).is_none() {
            return Err(ShopError::not_found("location", location_id));
        }

        let mut quantities: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokens {
            let captures = SUPPLY_ENTRY
                .captures(token)
                .ok_or_else(|| ShopError::InvalidInput(format!("malformed entry '{token}'")))?;
            let item_id = &captures[1];
            if catalog.item(item_id).is_none() {
                return Err(ShopError::not_found("item", item_id));
            }
            let quantity: u32 = captures[2]
                .parse()
                .map_err(|_| ShopError::InvalidInput(format!("bad quantity in '{token}'")))?;
            *quantities.entry(item_id.to_string()).or_default() += quantity;
        }

        if quantities.is_empty() {
            return Err(ShopError::InvalidInput("no items given".to_string()));
        }

        Ok(Self::new(vec![LocationDelivery {
            location_id: location_id.to_string(),
            quantities,
        }]))
    }

    pub fn total_units(&self) -> u32 {
        self.deliveries
            .iter()
            .flat_map(|delivery| delivery.quantities.values())
            .sum()
    }
}

/// Where an order would be sourced from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sourcing<'a> {
    Pickup(&'a str),
    Delivery,
}

/// Stock on hand per location per item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    stock: BTreeMap<String, BTreeMap<String, u32>>,
    /// Location that delivery orders draw from, if the catalog pins one
    delivery_source: Option<String>,
}

impl Inventory {
    pub fn quantity(&self, location_id: &str, item_id: &str) -> u32 {
        self.stock
            .get(location_id)
            .and_then(|items| items.get(item_id))
            .copied()
            .unwrap_or(0)
    }

    /// Units of an item across all locations
    pub fn total(&self, item_id: &str) -> u32 {
        self.stock
            .values()
            .filter_map(|items| items.get(item_id))
            .sum()
    }

    pub fn locations(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, u32>)> {
        self.stock
            .iter()
            .map(|(location, items)| (location.as_str(), items))
    }

    /// Whether an item can be ordered under the given sourcing
    ///
    /// Delivery checks the same location a fulfilled delivery order is
    /// charged to: the pinned source when there is one, otherwise any
    /// location holding the item.
    pub fn is_available(&self, item_id: &str, sourcing: Sourcing<'_>) -> bool {
        match sourcing {
            Sourcing::Pickup(location_id) => self.quantity(location_id, item_id) > 0,
            Sourcing::Delivery => match &self.delivery_source {
                Some(source) => self.quantity(source, item_id) > 0,
                None => self
                    .stock
                    .values()
                    .any(|items| items.get(item_id).copied().unwrap_or(0) > 0),
            },
        }
    }

    /// A collection is available when at least one of its items is
    pub fn is_collection_available(&self, collection: &Collection, sourcing: Sourcing<'_>) -> bool {
        collection
            .items
            .iter()
            .any(|item| self.is_available(&item.id, sourcing))
    }

    fn add(&mut self, location_id: &str, item_id: &str, quantity: u32) {
        if let Some(slot) = self
            .stock
            .get_mut(location_id)
            .and_then(|items| items.get_mut(item_id))
        {
            *slot = slot.saturating_add(quantity);
        }
    }

    fn take_one(&mut self, location_id: &str, item_id: &str) {
        if let Some(slot) = self
            .stock
            .get_mut(location_id)
            .and_then(|items| items.get_mut(item_id))
        {
            *slot = slot.saturating_sub(1);
        }
    }

    fn delivery_location(&self, catalog: &Catalog, item_id: &str) -> Option<String> {
        if let Some(source) = &catalog.delivery_source {
            return Some(source.clone());
        }

        let mut best: Option<(&str, u32)> = None;
        for location in &catalog.locations {
            let quantity = self.quantity(&location.id, item_id);
            if quantity > 0 && best.map_or(true, |(_, current)| quantity > current) {
                best = Some((&location.id, quantity));
            }
        }
        best.map(|(location, _)| location.to_string())
    }
}

/// Compute stock from supply batches and fulfilled orders
///
/// Only locations and items known to the catalog are tracked; quantities for
/// anything else are ignored. Orders that are not fulfilled are skipped, so
/// callers may pass the full order list. Quantities never go below zero.
pub fn resolve(catalog: &Catalog, batches: &[SupplyBatch], orders: &[Order]) -> Inventory {
    let mut inventory = Inventory {
        delivery_source: catalog.delivery_source.clone(),
        ..Inventory::default()
    };
    for location in &catalog.locations {
        let items = catalog
            .items()
            .map(|item| (item.id.clone(), 0))
            .collect::<BTreeMap<_, _>>();
        inventory.stock.insert(location.id.clone(), items);
    }

    for batch in batches {
        for delivery in &batch.deliveries {
            for (item_id, quantity) in &delivery.quantities {
                inventory.add(&delivery.location_id, item_id, *quantity);
            }
        }
    }

    for order in orders.iter().filter(|o| o.status == OrderStatus::Fulfilled) {
        let location = match order.fulfillment.location_id() {
            Some(location_id) => Some(location_id.to_string()),
            None => inventory.delivery_location(catalog, &order.item_id),
        };
        if let Some(location_id) = location {
            inventory.take_one(&location_id, &order.item_id);
        }
    }

    inventory
}
