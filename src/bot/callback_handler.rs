//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::debug;

use crate::dialogue::ShopDialogue;
use crate::engine::ConversationEngine;
use crate::events::{Event, Selection};
use crate::localization::t_lang;
use crate::order::OperatorAction;

use super::dialogue_manager::{run_turn, NoticeDelivery};
use super::operator_handler::operator_callback_handler;
use super::HandlerResult;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: ShopDialogue,
    engine: Arc<ConversationEngine>,
) -> HandlerResult {
    let data = q.data.as_deref().unwrap_or_default();
    debug!(user_id = %q.from.id, data = %data, "Received callback query from user");

    if let Some(action) = OperatorAction::parse(data) {
        return operator_callback_handler(bot, q, action, engine).await;
    }

    let Some(selection) = Selection::parse(data) else {
        debug!(user_id = %q.from.id, data = %data, "Unknown callback data");
        bot.answer_callback_query(q.id.clone())
            .text(t_lang("warn-invalid-action", q.from.language_code.as_deref()))
            .await?;
        return Ok(());
    };

    let (chat_id, edit) = match q.message.as_ref() {
        Some(message) => (message.chat().id, Some(message.id())),
        None => (ChatId(q.from.id.0 as i64), None),
    };

    run_turn(
        &bot,
        chat_id,
        &q.from,
        Event::Selected(selection),
        &dialogue,
        &engine,
        edit,
        NoticeDelivery::CallbackAlert(q.id.clone()),
    )
    .await
}
