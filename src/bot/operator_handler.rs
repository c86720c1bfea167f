//! Operator Handler module: stock commands and order status buttons

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageId};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use crate::engine::ConversationEngine;
use crate::inventory::SupplyBatch;
use crate::localization::{t_args_lang, t_lang};
use crate::order::{OperatorAction, Order, OrderStatus};

use super::ui_builder::format_stock_report;
use super::HandlerResult;

/// Commands restricted to operator chats
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Operator commands:")]
pub enum OperatorCommand {
    #[command(description = "show current stock")]
    Stock,
    #[command(description = "record a delivery: /supply <location> <item>=<qty> ...")]
    Supply(String),
}

pub async fn operator_command_handler(
    bot: Bot,
    msg: Message,
    cmd: OperatorCommand,
    engine: Arc<ConversationEngine>,
) -> HandlerResult {
    let config = engine.config();
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());

    if !config.is_operator(msg.chat.id.0) {
        warn!(chat_id = %msg.chat.id, command = ?cmd, "Operator command from unauthorized chat");
        bot.send_message(msg.chat.id, t_lang("operator-only", language_code))
            .await?;
        return Ok(());
    }

    let finalizer = engine.finalizer();
    match cmd {
        OperatorCommand::Stock => {
            let report = match finalizer.current_inventory(&config.catalog).await {
                Ok(inventory) => format_stock_report(&inventory, &config.catalog, language_code),
                Err(e) => {
                    error!(error = %e, "Failed to compute inventory for stock report");
                    t_lang("warn-stock-unknown", language_code)
                }
            };
            bot.send_message(msg.chat.id, report).await?;
        }
        OperatorCommand::Supply(input) => {
            let reply = match SupplyBatch::parse_command(&input, &config.catalog) {
                Ok(batch) => match finalizer.supply().record_batch(&batch).await {
                    Ok(()) => {
                        let location = batch
                            .deliveries
                            .first()
                            .and_then(|d| config.catalog.location(&d.location_id))
                            .map(|l| l.name.clone())
                            .unwrap_or_default();
                        t_args_lang(
                            "supply-recorded",
                            &[
                                ("units", &batch.total_units().to_string()),
                                ("location", &location),
                            ],
                            language_code,
                        )
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to record supply batch");
                        t_lang("warn-service-unavailable", language_code)
                    }
                },
                Err(e) => {
                    debug!(input = %input, error = %e, "Rejected supply command");
                    t_lang("supply-invalid", language_code)
                }
            };
            bot.send_message(msg.chat.id, reply).await?;
        }
    }

    Ok(())
}

/// Handle a press on an order notification's fulfil/cancel button
pub async fn operator_callback_handler(
    bot: Bot,
    q: CallbackQuery,
    action: OperatorAction,
    engine: Arc<ConversationEngine>,
) -> HandlerResult {
    let config = engine.config();
    let language_code = q.from.language_code.as_deref();
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let chat_id = message.chat().id;

    if !config.is_operator(chat_id.0) {
        warn!(chat_id = %chat_id, user_id = %q.from.id, "Order action from unauthorized chat");
        bot.answer_callback_query(q.id.clone())
            .text(t_lang("operator-only", language_code))
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let order_id = action.order_id();
    let updated = engine
        .finalizer()
        .orders()
        .set_status(order_id, action.target_status())
        .await;

    match updated {
        Ok(Some(order)) => {
            info!(
                order_id = %order.id,
                status = %order.status,
                operator = %q.from.id,
                "Order status changed"
            );
            bot.answer_callback_query(q.id.clone())
                .text(status_text(order.status, language_code))
                .await?;
            match order.status {
                OrderStatus::Cancelled => {
                    retract_notification(&bot, &order, (chat_id, message.id())).await;
                    inform_customer_of_cancellation(&bot, &order).await;
                }
                _ => mark_notification(&bot, chat_id, message.id(), &order, language_code).await,
            }
        }
        Ok(None) => {
            debug!(order_id = %order_id, "Order already handled or unknown");
            bot.answer_callback_query(q.id.clone())
                .text(t_lang("operator-status-handled", language_code))
                .show_alert(true)
                .await?;
        }
        Err(e) => {
            error!(order_id = %order_id, error = %e, "Failed to update order status");
            bot.answer_callback_query(q.id.clone())
                .text(t_lang("warn-service-unavailable", language_code))
                .show_alert(true)
                .await?;
        }
    }

    Ok(())
}

fn status_text(status: OrderStatus, language_code: Option<&str>) -> String {
    match status {
        OrderStatus::Fulfilled => t_lang("operator-status-fulfilled", language_code),
        OrderStatus::Cancelled => t_lang("operator-status-cancelled", language_code),
        OrderStatus::Pending => t_lang("operator-status-handled", language_code),
    }
}

/// Delete the operator notification through the stored handle, or the
/// pressed message when no handle was stored
async fn retract_notification(bot: &Bot, order: &Order, pressed: (ChatId, MessageId)) {
    let (chat_id, message_id) = match order.notification {
        Some(handle) => (ChatId(handle.chat_id), MessageId(handle.message_id)),
        None => {
            warn!(order_id = %order.id, "Cancelled order has no stored notification handle");
            pressed
        }
    };
    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        error!(order_id = %order.id, error = %e, "Failed to retract operator notification");
    }
}

async fn inform_customer_of_cancellation(bot: &Bot, order: &Order) {
    let text = t_args_lang(
        "order-cancelled-by-operator",
        &[("number", &order.number())],
        None,
    );
    if let Err(e) = bot
        .send_message(ChatId(order.customer.user_id), text)
        .await
    {
        error!(order_id = %order.id, user_id = order.customer.user_id, error = %e, "Failed to inform customer of cancellation");
    }
}

/// Replace the buttons with the final status
async fn mark_notification(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    order: &Order,
    language_code: Option<&str>,
) {
    if let Err(e) = bot.edit_message_reply_markup(chat_id, message_id).await {
        warn!(order_id = %order.id, error = %e, "Failed to remove operator buttons");
    }
    let text = format!("#{} {}", order.number(), status_text(order.status, language_code));
    if let Err(e) = bot.send_message(chat_id, text).await {
        warn!(order_id = %order.id, error = %e, "Failed to post status reply");
    }
}
