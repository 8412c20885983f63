use std::path::{Path, PathBuf};
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::broadcast::delivery_log::{latest_log, summarize_log};
use crate::config::AppState;
use crate::handlers::admin::is_admin;
use crate::handlers::broadcast::HandlerResult;

/// Uploads the most recent delivery log in reply to /getlog.
pub async fn send_latest_log(bot: Bot, msg: Message, state: Arc<AppState>) -> HandlerResult {
    if !is_admin(&msg, state.admin_id) {
        bot.send_message(msg.chat.id, "⛔ You are not authorized to use this command.")
            .await?;
        return Ok(());
    }

    match latest_log(&state.paths.logs_dir()) {
        Some(path) => {
            bot.send_document(msg.chat.id, InputFile::file(path)).await?;
        }
        None => {
            bot.send_message(msg.chat.id, "No delivery logs yet.").await?;
        }
    }
    Ok(())
}

/// Recomputes the percentage breakdown from a stored log for /logsummary.
/// Read-only: nothing is re-sent.
pub async fn send_log_summary(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    file: String,
) -> HandlerResult {
    if !is_admin(&msg, state.admin_id) {
        bot.send_message(msg.chat.id, "⛔ You are not authorized to use this command.")
            .await?;
        return Ok(());
    }

    let path = if file.trim().is_empty() {
        match latest_log(&state.paths.logs_dir()) {
            Some(path) => path,
            None => {
                bot.send_message(msg.chat.id, "No delivery logs yet.").await?;
                return Ok(());
            }
        }
    } else {
        match resolve_log_name(&state.paths.logs_dir(), file.trim()) {
            Some(path) => path,
            None => {
                bot.send_message(msg.chat.id, "Invalid log file name.").await?;
                return Ok(());
            }
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match summarize_log(&path) {
        Ok(summary) => {
            bot.send_message(msg.chat.id, summary.render(&name)).await?;
        }
        Err(e) => {
            log::warn!("log summary failed for {:?}: {:#}", path, e);
            bot.send_message(msg.chat.id, format!("❌ Could not read log: {e:#}"))
                .await?;
        }
    }
    Ok(())
}

/// Keeps summaries inside the logs directory: only a bare file name is
/// accepted, no path components.
fn resolve_log_name(logs_dir: &Path, name: &str) -> Option<PathBuf> {
    let file_name = Path::new(name).file_name()?.to_str()?;
    if file_name != name {
        return None;
    }
    Some(logs_dir.join(file_name))
}
