//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::debug;

use crate::dialogue::ShopDialogue;
use crate::engine::ConversationEngine;
use crate::events::{Command, Event};

use super::dialogue_manager::{run_turn, NoticeDelivery};
use super::HandlerResult;

/// Commands available to every customer
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum CustomerCommand {
    #[command(description = "start a new order")]
    Start(String),
    #[command(description = "cancel the current order")]
    Cancel,
    #[command(description = "show your referral code and discount")]
    Account,
    #[command(description = "show help")]
    Help,
}

impl From<CustomerCommand> for Command {
    fn from(command: CustomerCommand) -> Self {
        match command {
            CustomerCommand::Start(payload) => {
                let payload = payload.trim();
                Command::Start {
                    referral: (!payload.is_empty()).then(|| payload.to_string()),
                }
            }
            CustomerCommand::Cancel => Command::Cancel,
            CustomerCommand::Account => Command::Dashboard,
            CustomerCommand::Help => Command::Help,
        }
    }
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: CustomerCommand,
    dialogue: ShopDialogue,
    engine: Arc<ConversationEngine>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    debug!(user_id = %user.id, command = ?cmd, "Received command from user");

    run_turn(
        &bot,
        msg.chat.id,
        user,
        Event::Command(cmd.into()),
        &dialogue,
        &engine,
        None,
        NoticeDelivery::Message,
    )
    .await
}

/// Free text: an address while one is awaited, otherwise a re-prompt
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: ShopDialogue,
    engine: Arc<ConversationEngine>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    if !msg.chat.is_private() {
        return Ok(());
    }

    let text = msg.text().unwrap_or_default().to_string();
    debug!(user_id = %user.id, chars = text.len(), "Received text message from user");

    run_turn(
        &bot,
        msg.chat.id,
        user,
        Event::Text(text),
        &dialogue,
        &engine,
        None,
        NoticeDelivery::Message,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_payload_becomes_referral() {
        let cmd = CustomerCommand::parse("/start AB12CD34", "shopbot").unwrap();
        assert_eq!(
            Command::from(cmd),
            Command::Start {
                referral: Some("AB12CD34".into())
            }
        );

        let cmd = CustomerCommand::parse("/start", "shopbot").unwrap();
        assert_eq!(Command::from(cmd), Command::Start { referral: None });
    }

    #[test]
    fn test_account_maps_to_dashboard() {
        let cmd = CustomerCommand::parse("/account", "shopbot").unwrap();
        assert_eq!(Command::from(cmd), Command::Dashboard);
    }
}
