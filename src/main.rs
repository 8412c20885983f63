use std::sync::Arc;

use anyhow::Error;
use teloxide::dispatching::UpdateHandler;
use teloxide::dispatching::dialogue::{self, InMemStorage};
use teloxide::dptree;
use teloxide::prelude::*;

use crate::commands::{AdminCommand, Command};
use crate::config::AppState;
use crate::handlers::{
    BroadcastState, admin_command_handler, command_handler, handle_broadcast_confirmation,
    receive_broadcast_content, stale_callback_handler,
};

mod audience;
mod broadcast;
mod commands;
mod config;
mod handlers;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging()?;

    log::info!("Starting premium broadcast bot...");
    if let Err(e) = config::load_environment() {
        log::error!("Failed to load environment: {}", e);
        return Err(e);
    }

    let state = Arc::new(AppState::from_env()?);
    state.paths.ensure()?;
    log::info!("Admin id: {}", state.admin_id);

    let bot = Bot::from_env();

    log::info!("Starting to dispatch updates...");
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state, InMemStorage::<BroadcastState>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot shutdown complete");
    Ok(())
}

fn schema() -> UpdateHandler<Error> {
    let message_handler = Update::filter_message()
        .branch(
            teloxide::filter_command::<AdminCommand, _>().endpoint(admin_command_handler),
        )
        .branch(teloxide::filter_command::<Command, _>().endpoint(command_handler))
        .branch(dptree::case![BroadcastState::AwaitingContent].endpoint(receive_broadcast_content));

    let callback_handler = Update::filter_callback_query()
        .branch(
            dptree::case![BroadcastState::PendingConfirmation { draft }]
                .endpoint(handle_broadcast_confirmation),
        )
        .branch(dptree::endpoint(stale_callback_handler));

    dialogue::enter::<Update, InMemStorage<BroadcastState>, BroadcastState, _>()
        .branch(message_handler)
        .branch(callback_handler)
}

fn init_logging() -> Result<(), Error> {
    use log::LevelFilter;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::Mutex;

    let console_level = match std::env::var("CONSOLE_LOG_LEVEL")
        .unwrap_or_else(|_| "INFO".to_string())
        .to_uppercase()
        .as_str()
    {
        "ERROR" => LevelFilter::Error,
        "DEBUG" => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };
    let file_level = match std::env::var("FILE_LOG_LEVEL")
        .unwrap_or_else(|_| "OFF".to_string())
        .to_uppercase()
        .as_str()
    {
        "ERROR" => Some(LevelFilter::Error),
        "ALL" | "INFO" => Some(LevelFilter::Info),
        _ => None,
    };

    let log_file = match file_level {
        Some(_) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open("bot_errors.log")?;
            Some(Arc::new(Mutex::new(file)))
        }
        None => None,
    };

    let max_level = std::cmp::max(console_level, file_level.unwrap_or(LevelFilter::Off));

    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .filter(None, max_level)
        .format(move |buf, record| {
            let line = format!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            );
            if record.level() <= console_level {
                writeln!(buf, "{}", line)?;
            }
            if let (Some(level), Some(handle)) = (file_level, &log_file) {
                if record.level() <= level {
                    if let Ok(mut guard) = handle.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }
                }
            }
            Ok(())
        })
        .init();

    Ok(())
}
