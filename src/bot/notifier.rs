//! Telegram implementation of the outbound notifier

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::notify::Notifier;
use crate::order::{NotificationHandle, OperatorNotification};
use crate::shop_config::ShopConfig;

use super::ui_builder::{format_operator_notification, operator_keyboard};

pub struct TelegramNotifier {
    bot: Bot,
    config: Arc<ShopConfig>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, config: Arc<ShopConfig>) -> Self {
        Self { bot, config }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_operator(&self, notification: &OperatorNotification) -> Result<NotificationHandle> {
        let chat_id = notification
            .operator_chat_id
            .unwrap_or(self.config.manager_chat_id);
        let text = format_operator_notification(
            notification,
            &self.config.branding.currency_symbol,
            None,
        );

        let sent = self
            .bot
            .send_message(ChatId(chat_id), text)
            .reply_markup(operator_keyboard(notification.order_id, None))
            .await
            .context("Failed to send operator notification")?;

        info!(
            order_id = %notification.order_id,
            operator_chat = chat_id,
            message_id = sent.id.0,
            "Operator notified"
        );

        Ok(NotificationHandle {
            chat_id,
            message_id: sent.id.0,
        })
    }

    async fn send_follow_up(&self, user_id: i64, text: String) -> Result<()> {
        self.bot
            .send_message(ChatId(user_id), text)
            .await
            .context("Failed to send follow-up message")?;
        debug!(user_id, "Follow-up message sent");
        Ok(())
    }
}
