use std::sync::Arc;

use teloxide::prelude::*;
use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

use crate::commands::{AdminCommand, Command};
use crate::config::AppState;
use crate::handlers::broadcast::{BroadcastDialogue, HandlerResult, cancel_broadcast, start_broadcast};
use crate::handlers::logs::{send_latest_log, send_log_summary};

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            let mut request = bot.send_message(
                msg.chat.id,
                "🚀 Welcome! Choose your membership below to unlock premium access.",
            );
            if let Some(keyboard) = membership_keyboard(state.membership_link.as_deref()) {
                request = request.reply_markup(keyboard);
            }
            request.await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
    }
    Ok(())
}

fn membership_keyboard(link: Option<&str>) -> Option<InlineKeyboardMarkup> {
    let url = Url::parse(link?).ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::url("🚀 Get Premium Access", url),
    ]]))
}

/// Each arm does its own admin gate, so an unauthorized caller gets a
/// rejection and no state change.
pub async fn admin_command_handler(
    bot: Bot,
    dialogue: BroadcastDialogue,
    msg: Message,
    cmd: AdminCommand,
    state: Arc<AppState>,
) -> HandlerResult {
    match cmd {
        AdminCommand::Broadcast => start_broadcast(bot, dialogue, msg, state).await,
        AdminCommand::Cancel => cancel_broadcast(bot, dialogue, msg, state).await,
        AdminCommand::GetLog => send_latest_log(bot, msg, state).await,
        AdminCommand::LogSummary { file } => send_log_summary(bot, msg, state, file).await,
    }
}
