//! # Shop Configuration Module
//!
//! Read-only configuration loaded once at start: the catalog, branding
//! strings, the manager chat and follow-up timing. Secrets (bot token,
//! database URL) come from the environment, not from this file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::Catalog;
use crate::errors::{Result, ShopError};
use crate::events::{Selection, MAX_TOKEN_LEN};

// Constants for shop configuration
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_IMAGES_DIR: &str = "images";
pub const DEFAULT_CURRENCY: &str = "€";

/// Shop name and money formatting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branding {
    pub shop_name: String,
    #[serde(default = "default_currency")]
    pub currency_symbol: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            shop_name: "Shop".to_string(),
            currency_symbol: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// Timing of the message sent to a customer some time after ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUpConfig {
    /// Whether follow-ups are sent at all
    pub enabled: bool,
    /// Lower bound of the random delay, in units
    pub min_delay: u64,
    /// Upper bound of the random delay, in units
    pub max_delay: u64,
    /// Length of one unit in seconds
    pub unit_secs: u64,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay: 1,
            max_delay: 30,
            unit_secs: 60, // minutes
        }
    }
}

impl FollowUpConfig {
    /// Pick a random delay within the configured range
    pub fn random_delay(&self) -> Duration {
        use rand::Rng;
        let units = rand::thread_rng().gen_range(self.min_delay..=self.max_delay);
        Duration::from_secs(units.saturating_mul(self.unit_secs))
    }
}

/// Configuration structure for the shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    /// Chat receiving notifications for orders without a store operator
    pub manager_chat_id: i64,
    #[serde(default)]
    pub branding: Branding,
    pub catalog: Catalog,
    #[serde(default)]
    pub follow_up: FollowUpConfig,
    /// Directory holding `<collection-id>.jpeg` pictures
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_images_dir() -> PathBuf {
    PathBuf::from(DEFAULT_IMAGES_DIR)
}

impl ShopConfig {
    /// Load and validate the configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ShopError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: ShopConfig = serde_json::from_str(content)
            .map_err(|e| ShopError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let catalog = &self.catalog;

        let mut seen = HashSet::new();
        for location in &catalog.locations {
            if !seen.insert(location.id.as_str()) {
                return Err(ShopError::Config(format!(
                    "duplicate location id '{}'",
                    location.id
                )));
            }
        }

        if let Some(source) = &catalog.delivery_source {
            if catalog.location(source).is_none() {
                return Err(ShopError::Config(format!(
                    "delivery source '{source}' is not a known location"
                )));
            }
        }

        let mut collections = HashSet::new();
        let mut items = HashSet::new();
        for collection in &catalog.collections {
            if !collections.insert(collection.id.as_str()) {
                return Err(ShopError::Config(format!(
                    "duplicate collection id '{}'",
                    collection.id
                )));
            }
            if collection.price.is_sign_negative() {
                return Err(ShopError::Config(format!(
                    "collection '{}' has a negative price",
                    collection.id
                )));
            }
            for item in &collection.items {
                if !items.insert(item.id.as_str()) {
                    return Err(ShopError::Config(format!(
                        "duplicate item id '{}'",
                        item.id
                    )));
                }
            }
        }

        let selections = catalog
            .locations
            .iter()
            .map(|location| Selection::Location(location.id.clone()))
            .chain(
                catalog
                    .product_types()
                    .into_iter()
                    .map(|product_type| Selection::ProductType(product_type.to_string())),
            )
            .chain(catalog.collections.iter().flat_map(|collection| {
                std::iter::once(Selection::Collection(collection.id.clone())).chain(
                    collection
                        .items
                        .iter()
                        .map(|item| Selection::Item(item.id.clone())),
                )
            }));
        for selection in selections {
            let token = selection.token();
            if token.len() > MAX_TOKEN_LEN {
                return Err(ShopError::Config(format!(
                    "button data '{token}' exceeds {MAX_TOKEN_LEN} bytes, shorten the id"
                )));
            }
        }

        if self.follow_up.min_delay > self.follow_up.max_delay {
            return Err(ShopError::Config(
                "follow-up min_delay exceeds max_delay".to_string(),
            ));
        }

        Ok(())
    }

    /// Chat that should receive the notification for an order
    pub fn operator_chat_for(&self, location_id: Option<&str>) -> i64 {
        location_id
            .and_then(|id| self.catalog.location(id))
            .and_then(|location| location.operator_chat_id)
            .unwrap_or(self.manager_chat_id)
    }

    /// Chats allowed to run operator commands
    pub fn is_operator(&self, chat_id: i64) -> bool {
        chat_id == self.manager_chat_id
            || self
                .catalog
                .locations
                .iter()
                .any(|location| location.operator_chat_id == Some(chat_id))
    }

    pub fn collection_image(&self, collection_id: &str) -> PathBuf {
        self.images_dir.join(format!("{collection_id}.jpeg"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "manager_chat_id": 100,
        "catalog": {
            "locations": [
                {"id": "central", "name": "Central", "operator_chat_id": 200},
                {"id": "north", "name": "North"}
            ],
            "collections": [
                {"id": "classic", "name": "Classic", "product_type": "Liquid", "price": 25,
                 "items": [{"id": "mint", "name": "Mint"}]}
            ]
        }
    }"#;

    #[test]
    fn test_defaults_applied() {
        let config = ShopConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.branding.currency_symbol, "€");
        assert_eq!(config.follow_up, FollowUpConfig::default());
        assert_eq!(config.images_dir, PathBuf::from("images"));
        assert_eq!(
            config.collection_image("classic"),
            PathBuf::from("images/classic.jpeg")
        );
    }

    #[test]
    fn test_operator_routing() {
        let config = ShopConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.operator_chat_for(Some("central")), 200);
        assert_eq!(config.operator_chat_for(Some("north")), 100);
        assert_eq!(config.operator_chat_for(None), 100);
        assert!(config.is_operator(100));
        assert!(config.is_operator(200));
        assert!(!config.is_operator(300));
    }

    #[test]
    fn test_duplicate_item_rejected() {
        let json = MINIMAL.replace(
            r#"[{"id": "mint", "name": "Mint"}]"#,
            r#"[{"id": "mint", "name": "Mint"}, {"id": "mint", "name": "Mint 2"}]"#,
        );
        assert!(matches!(
            ShopConfig::from_json(&json),
            Err(ShopError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_delivery_source_rejected() {
        let json = MINIMAL.replace(
            r#""collections""#,
            r#""delivery_source": "south", "collections""#,
        );
        assert!(matches!(
            ShopConfig::from_json(&json),
            Err(ShopError::Config(_))
        ));
    }

    #[test]
    fn test_oversized_button_data_rejected() {
        let long_type = "Liquid ".repeat(10);
        let json = MINIMAL.replace(r#""product_type": "Liquid""#, &format!(r#""product_type": "{long_type}""#));
        assert!(matches!(
            ShopConfig::from_json(&json),
            Err(ShopError::Config(_))
        ));

        let json = MINIMAL.replace(r#""id": "mint""#, &format!(r#""id": "{}""#, "m".repeat(60)));
        assert!(matches!(
            ShopConfig::from_json(&json),
            Err(ShopError::Config(_))
        ));

        let json = MINIMAL.replace(r#""id": "mint""#, &format!(r#""id": "{}""#, "m".repeat(59)));
        assert!(ShopConfig::from_json(&json).is_ok());
    }

    #[test]
    fn test_random_delay_within_range() {
        let follow_up = FollowUpConfig {
            enabled: true,
            min_delay: 2,
            max_delay: 4,
            unit_secs: 10,
        };
        for _ in 0..20 {
            let delay = follow_up.random_delay().as_secs();
            assert!((20..=40).contains(&delay));
        }
    }
}
