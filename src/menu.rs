//! Menu builder: turns the current step and session into a screen.
//!
//! Collections and items carry an availability marker computed from the
//! inventory, but they stay selectable. Stock is enforced when an item is
//! picked and again when the order is finalized.

use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::catalog::Collection;
use crate::dialogue::{Checkout, FulfillmentKind, Session, Step};
use crate::errors::{Result, ShopError};
use crate::events::Selection;
use crate::inventory::{Inventory, Sourcing};
use crate::localization::{t_args_lang, t_lang};
use crate::order::{apply_discount, Order};
use crate::referral::ReferralAccount;
use crate::shop_config::ShopConfig;

/// One selectable option
#[derive(Debug, Clone, PartialEq)]
pub struct MenuOption {
    pub label: String,
    pub selection: Selection,
    /// Stock marker for collections and items; `None` for plain navigation
    pub availability: Option<bool>,
}

impl MenuOption {
    fn plain(label: String, selection: Selection) -> Self {
        Self {
            label,
            selection,
            availability: None,
        }
    }

    fn marked(label: &str, suffix: &str, selection: Selection, available: bool, lang: Option<&str>) -> Self {
        let label = if available {
            format!("✅ {label}{suffix}")
        } else {
            format!("❌ {label}{suffix} ({})", t_lang("label-out-of-stock", lang))
        };
        Self {
            label,
            selection,
            availability: Some(available),
        }
    }
}

/// Transport-neutral screen
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rendered {
    pub text: String,
    pub options: Vec<MenuOption>,
    /// Picture to send along with the text, if the file exists
    pub attachment: Option<PathBuf>,
}

/// Everything a screen may depend on besides the session
pub struct MenuContext<'a> {
    pub config: &'a ShopConfig,
    pub inventory: &'a Inventory,
    pub customer_name: &'a str,
    pub account: Option<&'a ReferralAccount>,
    pub discount_percent: u8,
    pub language_code: Option<&'a str>,
}

pub fn format_price(amount: Decimal, currency: &str) -> String {
    format!("{}{}", amount.normalize(), currency)
}

fn back_option(lang: Option<&str>) -> MenuOption {
    MenuOption::plain(t_lang("btn-back", lang), Selection::Back)
}

/// Render the screen for the session's current step
pub fn render(session: &Session, ctx: &MenuContext<'_>) -> Result<Rendered> {
    let step = session.step;
    if !session.has_context_for(step) {
        return Err(ShopError::MissingContext(step.name().to_string()));
    }

    let lang = ctx.language_code;
    let catalog = &ctx.config.catalog;

    let rendered = match step {
        Step::Greeting => Rendered {
            text: format!(
                "{}\n\n{}",
                t_args_lang(
                    "welcome",
                    &[
                        ("shop", &ctx.config.branding.shop_name),
                        ("name", ctx.customer_name)
                    ],
                    lang
                ),
                t_lang("welcome-hint", lang)
            ),
            options: vec![
                MenuOption::plain(t_lang("btn-begin", lang), Selection::BeginShopping),
                MenuOption::plain(t_lang("btn-dashboard", lang), Selection::OpenDashboard),
            ],
            attachment: None,
        },
        Step::ViewingDashboard => Rendered {
            text: dashboard_text(ctx.account, lang),
            options: vec![back_option(lang)],
            attachment: None,
        },
        Step::ChoosingFulfillment => Rendered {
            text: t_lang("choose-fulfillment", lang),
            options: vec![
                MenuOption::plain(
                    t_lang("btn-pickup", lang),
                    Selection::Fulfillment(FulfillmentKind::Pickup),
                ),
                MenuOption::plain(
                    t_lang("btn-delivery", lang),
                    Selection::Fulfillment(FulfillmentKind::Delivery),
                ),
                back_option(lang),
            ],
            attachment: None,
        },
        Step::ChoosingLocation => {
            let mut options: Vec<MenuOption> = catalog
                .locations
                .iter()
                .map(|location| {
                    MenuOption::plain(
                        location.name.clone(),
                        Selection::Location(location.id.clone()),
                    )
                })
                .collect();
            options.push(back_option(lang));
            Rendered {
                text: t_lang("choose-location", lang),
                options,
                attachment: None,
            }
        }
        Step::AwaitingAddress => Rendered {
            text: t_lang("ask-address", lang),
            options: vec![back_option(lang)],
            attachment: None,
        },
        Step::ChoosingProductType => {
            let mut options: Vec<MenuOption> = catalog
                .product_types()
                .into_iter()
                .map(|kind| MenuOption::plain(kind.to_string(), Selection::ProductType(kind.to_string())))
                .collect();
            options.push(back_option(lang));
            Rendered {
                text: format!(
                    "{}\n\n{}",
                    fulfillment_summary(session, ctx)?,
                    t_lang("choose-product-type", lang)
                ),
                options,
                attachment: None,
            }
        }
        Step::ChoosingCollection => {
            let product_type = session.product_type.as_deref().unwrap_or_default();
            let sourcing = sourcing_of(session)?;
            let currency = &ctx.config.branding.currency_symbol;
            let mut options: Vec<MenuOption> = catalog
                .collections_of_type(product_type)
                .map(|collection| {
                    MenuOption::marked(
                        &collection.name,
                        &format!(" — {}", format_price(collection.price, currency)),
                        Selection::Collection(collection.id.clone()),
                        ctx.inventory.is_collection_available(collection, sourcing),
                        lang,
                    )
                })
                .collect();
            options.push(back_option(lang));
            Rendered {
                text: format!(
                    "{}\n\n{}",
                    fulfillment_summary(session, ctx)?,
                    t_lang("choose-collection", lang)
                ),
                options,
                attachment: None,
            }
        }
        Step::ChoosingItem => {
            let collection = selected_collection(session, ctx)?;
            let sourcing = sourcing_of(session)?;
            let mut options: Vec<MenuOption> = collection
                .items
                .iter()
                .map(|item| {
                    MenuOption::marked(
                        &item.name,
                        "",
                        Selection::Item(item.id.clone()),
                        ctx.inventory.is_available(&item.id, sourcing),
                        lang,
                    )
                })
                .collect();
            options.push(back_option(lang));

            let mut text = format!(
                "{}\n{}\n{}",
                fulfillment_summary(session, ctx)?,
                t_args_lang("summary-collection", &[("collection", &collection.name)], lang),
                t_args_lang(
                    "summary-price",
                    &[(
                        "price",
                        &format_price(collection.price, &ctx.config.branding.currency_symbol)
                    )],
                    lang
                ),
            );
            if !collection.description.is_empty() {
                text.push_str(&format!("\n\n{}", collection.description));
            }
            text.push_str(&format!("\n\n{}", t_lang("choose-item", lang)));

            Rendered {
                text,
                options,
                attachment: Some(ctx.config.collection_image(&collection.id)),
            }
        }
        Step::Completed(Checkout::AwaitingDiscountChoice) => {
            let collection = selected_collection(session, ctx)?;
            let item_id = session.item_id.as_deref().unwrap_or_default();
            let item = collection
                .item(item_id)
                .ok_or_else(|| ShopError::not_found("item", item_id))?;
            let currency = &ctx.config.branding.currency_symbol;
            let percent = ctx.discount_percent.to_string();
            let discounted = apply_discount(collection.price, ctx.discount_percent);

            Rendered {
                text: [
                    fulfillment_summary(session, ctx)?,
                    t_args_lang("summary-collection", &[("collection", &collection.name)], lang),
                    t_args_lang("summary-item", &[("item", &item.name)], lang),
                    t_args_lang(
                        "summary-price",
                        &[("price", &format_price(collection.price, currency))],
                        lang,
                    ),
                    String::new(),
                    t_args_lang("discount-prompt", &[("percent", &percent)], lang),
                    t_args_lang(
                        "discount-total",
                        &[("total", &format_price(discounted, currency))],
                        lang,
                    ),
                ]
                .join("\n"),
                options: vec![
                    MenuOption::plain(
                        t_args_lang("btn-apply-discount", &[("percent", &percent)], lang),
                        Selection::ApplyDiscount,
                    ),
                    MenuOption::plain(t_lang("btn-skip-discount", lang), Selection::SkipDiscount),
                    back_option(lang),
                ],
                attachment: None,
            }
        }
        Step::Completed(Checkout::PendingRetry { .. }) => Rendered {
            text: t_lang("order-retry-prompt", lang),
            options: vec![
                MenuOption::plain(t_lang("btn-retry", lang), Selection::Retry),
                back_option(lang),
                MenuOption::plain(t_lang("btn-cancel", lang), Selection::Cancel),
            ],
            attachment: None,
        },
    };

    Ok(rendered)
}

/// Screen shown once an order has been placed
pub fn render_confirmation(order: &Order, config: &ShopConfig, lang: Option<&str>) -> Rendered {
    let currency = &config.branding.currency_symbol;
    let mut lines = vec![
        t_args_lang("order-confirmed", &[("number", &order.number())], lang),
        String::new(),
    ];

    lines.push(match &order.fulfillment {
        crate::order::FulfillmentInfo::Pickup { location_name, .. } => {
            t_args_lang("summary-location", &[("location", location_name)], lang)
        }
        crate::order::FulfillmentInfo::Delivery { address } => {
            t_args_lang("summary-address", &[("address", address)], lang)
        }
    });
    lines.push(t_args_lang(
        "summary-collection",
        &[("collection", &order.collection_name)],
        lang,
    ));
    lines.push(t_args_lang("summary-item", &[("item", &order.item_name)], lang));
    if order.discount_percent > 0 {
        lines.push(t_args_lang(
            "order-discount-applied",
            &[("percent", &order.discount_percent.to_string())],
            lang,
        ));
    }
    lines.push(t_args_lang(
        "order-total",
        &[("total", &format_price(order.total, currency))],
        lang,
    ));
    lines.push(String::new());
    lines.push(if order.fulfillment.is_delivery() {
        t_lang("order-delivery-hint", lang)
    } else {
        t_lang("order-pickup-hint", lang)
    });
    lines.push(t_lang("order-new-hint", lang));

    Rendered {
        text: lines.join("\n"),
        options: vec![MenuOption::plain(
            t_lang("btn-begin", lang),
            Selection::BeginShopping,
        )],
        attachment: None,
    }
}

fn dashboard_text(account: Option<&ReferralAccount>, lang: Option<&str>) -> String {
    match account {
        Some(account) => [
            t_lang("dashboard-title", lang),
            String::new(),
            t_args_lang("dashboard-code", &[("code", &account.code)], lang),
            t_args_lang(
                "dashboard-referrals",
                &[("count", &account.total_referrals.to_string())],
                lang,
            ),
            t_args_lang(
                "dashboard-discount",
                &[("percent", &account.discount_percent.to_string())],
                lang,
            ),
        ]
        .join("\n"),
        None => format!(
            "{}\n\n{}",
            t_lang("dashboard-title", lang),
            t_lang("dashboard-unavailable", lang)
        ),
    }
}

fn sourcing_of(session: &Session) -> Result<Sourcing<'_>> {
    session
        .sourcing()
        .ok_or_else(|| ShopError::MissingContext(session.step.name().to_string()))
}

fn selected_collection<'a>(session: &Session, ctx: &MenuContext<'a>) -> Result<&'a Collection> {
    let collection_id = session.collection_id.as_deref().unwrap_or_default();
    ctx.config
        .catalog
        .collection(collection_id)
        .ok_or_else(|| ShopError::not_found("collection", collection_id))
}

/// "Store: X" or "Delivery address: Y"
fn fulfillment_summary(session: &Session, ctx: &MenuContext<'_>) -> Result<String> {
    let lang = ctx.language_code;
    match sourcing_of(session)? {
        Sourcing::Pickup(location_id) => {
            let location = ctx
                .config
                .catalog
                .location(location_id)
                .ok_or_else(|| ShopError::not_found("location", location_id))?;
            Ok(t_args_lang("summary-location", &[("location", &location.name)], lang))
        }
        Sourcing::Delivery => Ok(t_args_lang(
            "summary-address",
            &[("address", session.address.as_deref().unwrap_or_default())],
            lang,
        )),
    }
}
