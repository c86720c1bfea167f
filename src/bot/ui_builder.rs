//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;
use uuid::Uuid;

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::catalog::Catalog;
use crate::events::MAX_TOKEN_LEN;
use crate::inventory::Inventory;
use crate::menu::{format_price, Rendered};
use crate::order::{FulfillmentInfo, OperatorAction, OperatorNotification};

/// One button per row, in menu order
pub fn keyboard_for(screen: &Rendered) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = screen
        .options
        .iter()
        .filter_map(|option| {
            let token = option.selection.token();
            if token.len() > MAX_TOKEN_LEN {
                warn!(token = %token, "Dropping option with oversized callback data");
                return None;
            }
            Some(vec![InlineKeyboardButton::callback(option.label.clone(), token)])
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

/// Create the operator's fulfil/cancel keyboard for a pending order
pub fn operator_keyboard(order_id: Uuid, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            t_lang("btn-op-fulfil", language_code),
            OperatorAction::Fulfil(order_id).token(),
        ),
        InlineKeyboardButton::callback(
            t_lang("btn-op-cancel", language_code),
            OperatorAction::Cancel(order_id).token(),
        ),
    ]])
}

/// Format the message posted to the operator chat
pub fn format_operator_notification(
    notification: &OperatorNotification,
    currency: &str,
    language_code: Option<&str>,
) -> String {
    let customer = &notification.customer;
    let mut lines = vec![
        t_args_lang(
            "operator-order-title",
            &[("number", &notification.number)],
            language_code,
        ),
        t_args_lang(
            "operator-date",
            &[(
                "date",
                &notification.timestamp.format("%d.%m.%Y %H:%M").to_string(),
            )],
            language_code,
        ),
        t_args_lang(
            "operator-customer",
            &[("name", &customer.full_name)],
            language_code,
        ),
        match &customer.username {
            Some(username) => t_args_lang("operator-username", &[("username", username)], language_code),
            None => t_lang("operator-no-username", language_code),
        },
        String::new(),
        t_lang("operator-order", language_code),
    ];

    for line in &notification.items {
        lines.push(t_args_lang(
            "operator-line",
            &[("collection", &line.collection), ("item", &line.item)],
            language_code,
        ));
    }

    lines.push(String::new());
    lines.push(match &notification.fulfillment {
        FulfillmentInfo::Pickup { location_name, .. } => {
            t_args_lang("operator-pickup", &[("location", location_name)], language_code)
        }
        FulfillmentInfo::Delivery { address } => {
            t_args_lang("operator-delivery", &[("address", address)], language_code)
        }
    });
    if notification.discount_percent > 0 {
        lines.push(t_args_lang(
            "operator-discount",
            &[("percent", &notification.discount_percent.to_string())],
            language_code,
        ));
    }
    lines.push(t_args_lang(
        "operator-total",
        &[("total", &format_price(notification.total, currency))],
        language_code,
    ));

    lines.join("\n")
}

/// Format the `/stock` report, locations and items in catalog order
pub fn format_stock_report(
    inventory: &Inventory,
    catalog: &Catalog,
    language_code: Option<&str>,
) -> String {
    let mut result = t_lang("stock-title", language_code);

    for location in &catalog.locations {
        result.push_str("\n\n");
        result.push_str(&t_args_lang(
            "stock-location",
            &[("location", &location.name)],
            language_code,
        ));

        let mut any = false;
        for item in catalog.items() {
            let quantity = inventory.quantity(&location.id, &item.id);
            if quantity == 0 {
                continue;
            }
            any = true;
            result.push('\n');
            result.push_str(&t_args_lang(
                "stock-line",
                &[("item", &item.name), ("quantity", &quantity.to_string())],
                language_code,
            ));
        }
        if !any {
            result.push('\n');
            result.push_str(&t_lang("stock-empty", language_code));
        }
    }

    result
}
