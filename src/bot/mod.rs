//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: customer commands and free-text messages
//! - `callback_handler`: inline keyboard callback queries
//! - `operator_handler`: operator commands and order status buttons
//! - `dialogue_manager`: runs engine turns and presents screens
//! - `ui_builder`: keyboards and message formatting
//! - `notifier`: operator notifications and follow-ups over Telegram

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod notifier;
pub mod operator_handler;
pub mod ui_builder;

use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{dialogue, UpdateHandler};
use teloxide::prelude::*;

use crate::dialogue::Session;

pub type HandlerResult = anyhow::Result<()>;

pub use callback_handler::callback_handler;
pub use message_handler::{message_handler, CustomerCommand};
pub use notifier::TelegramNotifier;
pub use operator_handler::OperatorCommand;

/// Dispatch tree: commands first, then free text, then button presses
///
/// Expects `Arc<ConversationEngine>` and `Arc<InMemStorage<Session>>` among
/// the dispatcher dependencies.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    let customer_commands = teloxide::filter_command::<CustomerCommand, _>()
        .endpoint(message_handler::command_handler);
    let operator_commands = teloxide::filter_command::<OperatorCommand, _>()
        .endpoint(operator_handler::operator_command_handler);

    let messages = Update::filter_message()
        .branch(customer_commands)
        .branch(operator_commands)
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some())
                .endpoint(message_handler::message_handler),
        );

    let callbacks = Update::filter_callback_query().endpoint(callback_handler);

    dialogue::enter::<Update, InMemStorage<Session>, Session, _>()
        .branch(messages)
        .branch(callbacks)
}
