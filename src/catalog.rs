//! # Catalog Module
//!
//! Read-only reference data: pickup locations, collections and the items
//! (flavors) inside them. The catalog is loaded once with the shop
//! configuration and never mutated by the ordering core.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// A pickup location (store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
    /// Chat of the operator responsible for this store, if any
    #[serde(default)]
    pub operator_chat_id: Option<i64>,
}

/// A single orderable item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
}

/// A collection of items sharing a price and a product type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub product_type: String,
    pub price: Decimal,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Collection {
    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == item_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub collections: Vec<Collection>,
    /// Location whose stock delivery orders consume. When unset, delivery
    /// orders consume from the location holding the most stock.
    #[serde(default)]
    pub delivery_source: Option<String>,
}

impl Catalog {
    pub fn location(&self, location_id: &str) -> Option<&Location> {
        self.locations.iter().find(|loc| loc.id == location_id)
    }

    pub fn collection(&self, collection_id: &str) -> Option<&Collection> {
        self.collections.iter().find(|col| col.id == collection_id)
    }

    /// Resolve an item within a collection
    pub fn find_item(&self, collection_id: &str, item_id: &str) -> Option<(&Collection, &Item)> {
        let collection = self.collection(collection_id)?;
        collection.item(item_id).map(|item| (collection, item))
    }

    /// Distinct product types in order of first appearance
    pub fn product_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for collection in &self.collections {
            if !types.contains(&collection.product_type.as_str()) {
                types.push(&collection.product_type);
            }
        }
        types
    }

    pub fn has_product_type(&self, product_type: &str) -> bool {
        self.collections
            .iter()
            .any(|col| col.product_type == product_type)
    }

    pub fn collections_of_type<'a>(
        &'a self,
        product_type: &'a str,
    ) -> impl Iterator<Item = &'a Collection> + 'a {
        self.collections
            .iter()
            .filter(move |col| col.product_type == product_type)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.collections.iter().flat_map(|col| col.items.iter())
    }

    /// Look up an item anywhere in the catalog by id
    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items().find(|item| item.id == item_id)
    }
}

/// Accept ids written either as JSON strings or numbers
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}
