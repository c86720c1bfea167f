//! Dialogue Manager module: runs one engine turn for a customer and shows the result

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, User};
use tracing::{debug, warn};

use crate::dialogue::ShopDialogue;
use crate::engine::{ConversationEngine, Notice};
use crate::events::Event;
use crate::menu::Rendered;
use crate::order::CustomerRef;

use super::ui_builder::keyboard_for;

/// Telegram's limit for photo captions
const MAX_CAPTION_CHARS: usize = 1024;

/// How the warning of a turn should reach the customer
pub enum NoticeDelivery {
    /// Separate chat message above the screen
    Message,
    /// Pop-up answer to the pressed button
    CallbackAlert(teloxide::types::CallbackQueryId),
}

pub fn customer_from(user: &User) -> CustomerRef {
    CustomerRef {
        user_id: user.id.0 as i64,
        username: user.username.clone(),
        full_name: user.full_name(),
    }
}

pub fn language_of(user: &User) -> Option<&str> {
    user.language_code.as_deref()
}

/// Feed one event through the engine, store the new session and present it
///
/// `edit` is the message holding the previous screen, replaced in place when
/// possible.
#[allow(clippy::too_many_arguments)]
pub async fn run_turn(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    event: Event,
    dialogue: &ShopDialogue,
    engine: &ConversationEngine,
    edit: Option<MessageId>,
    delivery: NoticeDelivery,
) -> Result<()> {
    let customer = customer_from(user);
    let language_code = language_of(user);
    let session = dialogue.get_or_default().await?;

    let turn = engine.handle(&customer, language_code, event, session).await;

    if turn.session.is_fresh() {
        dialogue.exit().await?;
    } else {
        dialogue.update(turn.session.clone()).await?;
    }
    debug!(user_id = customer.user_id, step = turn.session.step.name(), "Session stored");

    deliver_notice(bot, chat_id, turn.output.notice.as_ref(), delivery).await?;

    // A placed order leaves the previous screen as a receipt
    let edit = if turn.order.is_some() { None } else { edit };
    show_screen(bot, chat_id, &turn.output.screen, edit).await
}

async fn deliver_notice(
    bot: &Bot,
    chat_id: ChatId,
    notice: Option<&Notice>,
    delivery: NoticeDelivery,
) -> Result<()> {
    match (notice, delivery) {
        (Some(notice), NoticeDelivery::CallbackAlert(query_id)) => {
            bot.answer_callback_query(query_id)
                .text(notice.text.clone())
                .show_alert(true)
                .await?;
        }
        (None, NoticeDelivery::CallbackAlert(query_id)) => {
            bot.answer_callback_query(query_id).await?;
        }
        (Some(notice), NoticeDelivery::Message) => {
            bot.send_message(chat_id, notice.text.clone()).await?;
        }
        (None, NoticeDelivery::Message) => {}
    }
    Ok(())
}

/// Send or edit the message showing `screen`
pub async fn show_screen(
    bot: &Bot,
    chat_id: ChatId,
    screen: &Rendered,
    edit: Option<MessageId>,
) -> Result<()> {
    let keyboard = keyboard_for(screen);

    if let Some(path) = screen.attachment.as_ref().filter(|path| path.is_file()) {
        if let Some(message_id) = edit {
            if let Err(e) = bot.delete_message(chat_id, message_id).await {
                debug!(error = %e, "Previous screen could not be removed");
            }
        }
        if screen.text.chars().count() <= MAX_CAPTION_CHARS {
            bot.send_photo(chat_id, InputFile::file(path.clone()))
                .caption(screen.text.clone())
                .reply_markup(keyboard)
                .await?;
        } else {
            bot.send_photo(chat_id, InputFile::file(path.clone())).await?;
            bot.send_message(chat_id, screen.text.clone())
                .reply_markup(keyboard)
                .await?;
        }
        return Ok(());
    }

    if let Some(message_id) = edit {
        match bot
            .edit_message_text(chat_id, message_id, screen.text.clone())
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => {
                // Photos cannot be edited into text; send a fresh screen instead
                warn!(chat_id = %chat_id, error = %e, "Failed to edit screen, sending a new one");
            }
        }
    }

    bot.send_message(chat_id, screen.text.clone())
        .reply_markup(keyboard)
        .await?;
    Ok(())
}
