//! Telegram presentation helpers: operator messages, keyboards and the stock report

mod common;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use tempfile::NamedTempFile;
use uuid::Uuid;

use shopbot::bot::ui_builder::{format_operator_notification, format_stock_report, operator_keyboard};
use shopbot::inventory::{resolve, LocationDelivery, SupplyBatch};
use shopbot::order::{CustomerRef, FulfillmentInfo, OperatorAction, OperatorNotification, OrderLine};
use shopbot::shop_config::ShopConfig;

use common::{config, CONFIG_JSON};

fn notification(fulfillment: FulfillmentInfo, discount_percent: u8) -> OperatorNotification {
    OperatorNotification {
        order_id: Uuid::new_v4(),
        number: "1A2B3C4D".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap(),
        customer: CustomerRef {
            user_id: 42,
            username: Some("alex".to_string()),
            full_name: "Alex Smith".to_string(),
        },
        items: vec![OrderLine {
            collection: "Classic".to_string(),
            item: "Mint".to_string(),
        }],
        fulfillment,
        discount_percent,
        total: Decimal::from(20),
        operator_chat_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_notification_for_pickup() {
        let text = format_operator_notification(
            &notification(
                FulfillmentInfo::Pickup {
                    location_id: "central".to_string(),
                    location_name: "Central".to_string(),
                },
                0,
            ),
            "€",
            None,
        );

        assert!(text.contains("#1A2B3C4D"));
        assert!(text.contains("05.03.2024 14:07"));
        assert!(text.contains("Alex Smith"));
        assert!(text.contains("@alex"));
        assert!(text.contains("Classic: Mint"));
        assert!(text.contains("Pickup at Central"));
        assert!(text.contains("20€"));
        assert!(!text.contains("Discount"));
    }

    #[test]
    fn test_operator_notification_for_delivery_with_discount() {
        let mut payload = notification(
            FulfillmentInfo::Delivery {
                address: "Main St 5".to_string(),
            },
            20,
        );
        payload.customer.username = None;

        let text = format_operator_notification(&payload, "€", Some("en"));
        assert!(text.contains("Delivery to Main St 5"));
        assert!(text.contains("Discount: 20%"));
        assert!(text.contains("no username"));
    }

    #[test]
    fn test_operator_keyboard_tokens_parse_back() {
        let order_id = Uuid::new_v4();
        let keyboard = operator_keyboard(order_id, None);
        assert_eq!(keyboard.inline_keyboard.len(), 1);

        let actions: Vec<OperatorAction> = keyboard.inline_keyboard[0]
            .iter()
            .filter_map(|button| match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => {
                    OperatorAction::parse(data)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            actions,
            vec![OperatorAction::Fulfil(order_id), OperatorAction::Cancel(order_id)]
        );
    }

    #[test]
    fn test_stock_report_lists_nonzero_stock() {
        let config = config();
        let batch = SupplyBatch::new(vec![LocationDelivery {
            location_id: "central".to_string(),
            quantities: [("mint".to_string(), 3), ("ice".to_string(), 1)]
                .into_iter()
                .collect(),
        }]);
        let inventory = resolve(&config.catalog, &[batch], &[]);

        let report = format_stock_report(&inventory, &config.catalog, None);
        let (central, north) = report
            .split_once("North")
            .expect("report should list both locations");
        assert!(central.contains("Central"));
        assert!(central.contains("Mint: 3"));
        assert!(central.contains("Ice: 1"));
        assert!(!central.contains("Mango"));
        assert!(north.contains("nothing in stock"));
    }

    #[test]
    fn test_config_loaded_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG_JSON.as_bytes()).unwrap();

        let loaded = ShopConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config());
        assert_eq!(loaded.branding.shop_name, "Cloud Shop");
        assert!(!loaded.follow_up.enabled);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ShopConfig::load(dir.path().join("absent.json")).is_err());
    }
}
