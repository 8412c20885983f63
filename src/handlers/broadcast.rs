use std::sync::Arc;

use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

use crate::broadcast::{Draft, ProgressSink, TelegramGateway, run_broadcast};
use crate::config::AppState;
use crate::handlers::admin::is_admin;

pub type BroadcastDialogue = Dialogue<BroadcastState, InMemStorage<BroadcastState>>;
pub type HandlerResult = anyhow::Result<()>;

pub const CB_CONFIRM: &str = "broadcast_confirm";
pub const CB_CANCEL: &str = "broadcast_cancel";

/// Draft capture per admin chat: Idle until /broadcast, then the next
/// qualifying message becomes the draft, then an explicit confirm or
/// cancel returns to Idle.
#[derive(Clone, Default, Debug, PartialEq)]
pub enum BroadcastState {
    #[default]
    Idle,
    AwaitingContent,
    PendingConfirmation { draft: Draft },
}

/// Capture-machine input, decoupled from the transport.
#[derive(Clone, Debug)]
pub enum CaptureEvent {
    Start,
    Cancel,
    Content(Draft),
    NonQualifying,
    Confirm,
}

/// The capture transitions, as a pure function. Handlers do the messaging
/// and persist whatever state this returns.
pub fn next_state(
    current: BroadcastState,
    event: CaptureEvent,
    caller_is_admin: bool,
) -> BroadcastState {
    match event {
        CaptureEvent::Start | CaptureEvent::Cancel if !caller_is_admin => current,
        // A repeated start simply restarts the capture, overwriting any
        // not-yet-sent draft.
        CaptureEvent::Start => BroadcastState::AwaitingContent,
        CaptureEvent::Cancel => BroadcastState::Idle,
        CaptureEvent::Content(draft) => match current {
            BroadcastState::AwaitingContent => BroadcastState::PendingConfirmation { draft },
            other => other,
        },
        CaptureEvent::Confirm => match current {
            BroadcastState::PendingConfirmation { .. } => BroadcastState::Idle,
            other => other,
        },
        CaptureEvent::NonQualifying => current,
    }
}

pub async fn start_broadcast(
    bot: Bot,
    dialogue: BroadcastDialogue,
    msg: Message,
    state: Arc<AppState>,
) -> HandlerResult {
    let admin = is_admin(&msg, state.admin_id);
    if admin {
        bot.send_message(
            msg.chat.id,
            "📢 Send the message to broadcast (text or attachment).\n/cancel to abort.",
        )
        .await?;
    } else {
        bot.send_message(msg.chat.id, "⛔ You are not authorized to use this command.")
            .await?;
    }

    let current = dialogue.get().await?.unwrap_or_default();
    dialogue
        .update(next_state(current, CaptureEvent::Start, admin))
        .await?;
    Ok(())
}

pub async fn cancel_broadcast(
    bot: Bot,
    dialogue: BroadcastDialogue,
    msg: Message,
    state: Arc<AppState>,
) -> HandlerResult {
    let admin = is_admin(&msg, state.admin_id);
    if admin {
        bot.send_message(msg.chat.id, "❌ Cancelled.").await?;
    } else {
        bot.send_message(msg.chat.id, "⛔ You are not authorized to use this command.")
            .await?;
    }

    let current = dialogue.get().await?.unwrap_or_default();
    dialogue
        .update(next_state(current, CaptureEvent::Cancel, admin))
        .await?;
    Ok(())
}

pub async fn receive_broadcast_content(
    bot: Bot,
    dialogue: BroadcastDialogue,
    msg: Message,
) -> HandlerResult {
    // Commands are routed before this branch; anything command-shaped that
    // still lands here must not consume the capture.
    let command_shaped = msg.text().map(|t| t.starts_with('/')).unwrap_or(false);
    let event = if !command_shaped && qualifies_as_draft(&msg) {
        CaptureEvent::Content(Draft {
            from_chat: msg.chat.id,
            message_id: msg.id,
        })
    } else {
        CaptureEvent::NonQualifying
    };

    let current = dialogue.get().await?.unwrap_or_default();
    match next_state(current, event, true) {
        BroadcastState::PendingConfirmation { draft } => {
            // Preview exactly what recipients will get.
            bot.send_message(msg.chat.id, "📝 Preview:").await?;
            bot.copy_message(msg.chat.id, msg.chat.id, msg.id).await?;

            let keyboard = InlineKeyboardMarkup::new(vec![vec![
                InlineKeyboardButton::callback("✅ Send to all", CB_CONFIRM),
                InlineKeyboardButton::callback("❌ Cancel", CB_CANCEL),
            ]]);
            bot.send_message(msg.chat.id, "Send this message to all users?")
                .reply_markup(keyboard)
                .await?;

            dialogue
                .update(BroadcastState::PendingConfirmation { draft })
                .await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                "Still waiting for the broadcast content. /cancel to abort.",
            )
            .await?;
        }
    }
    Ok(())
}

fn qualifies_as_draft(msg: &Message) -> bool {
    msg.text().is_some()
        || msg.caption().is_some()
        || msg.photo().is_some()
        || msg.video().is_some()
        || msg.document().is_some()
        || msg.animation().is_some()
        || msg.audio().is_some()
        || msg.voice().is_some()
        || msg.sticker().is_some()
        || msg.video_note().is_some()
}

pub async fn handle_broadcast_confirmation(
    bot: Bot,
    dialogue: BroadcastDialogue,
    q: CallbackQuery,
    draft: Draft,
    state: Arc<AppState>,
) -> HandlerResult {
    let Some(data) = &q.data else {
        return Ok(());
    };

    // Remove the confirm buttons either way.
    if let Some(msg) = &q.message {
        let _ = bot.edit_message_reply_markup(msg.chat().id, msg.id()).await;
    }

    let current = dialogue.get().await?.unwrap_or_default();

    if data == CB_CANCEL {
        bot.answer_callback_query(q.id)
            .text("❌ Broadcast cancelled")
            .await?;
        dialogue
            .update(next_state(current, CaptureEvent::Cancel, true))
            .await?;
        return Ok(());
    }
    if data != CB_CONFIRM {
        return Ok(());
    }

    bot.answer_callback_query(q.id)
        .text("🚀 Starting broadcast...")
        .await?;
    let Some(msg) = &q.message else {
        dialogue
            .update(next_state(current, CaptureEvent::Cancel, true))
            .await?;
        return Ok(());
    };
    let chat_id = msg.chat().id;

    // Audience fetch is the one run-fatal failure: abort before any
    // log/backup/send happens.
    let audience = match state.audience.fetch().await {
        Ok(audience) => audience,
        Err(e) => {
            log::error!("audience fetch failed: {:#}", e);
            bot.send_message(chat_id, format!("❌ Audience unavailable: {e:#}"))
                .await?;
            dialogue
                .update(next_state(current, CaptureEvent::Cancel, true))
                .await?;
            return Ok(());
        }
    };

    let status = bot
        .send_message(chat_id, format!("📤 Sending… 0/{}", audience.len()))
        .await?;
    let progress = LiveProgress {
        bot: bot.clone(),
        chat: chat_id,
        message: status.id,
    };
    let gateway = TelegramGateway::new(bot.clone());
    let store = state.suppression_store();

    match run_broadcast(
        &gateway,
        &draft,
        &audience,
        &store,
        &state.paths.run_paths(),
        &progress,
        &state.engine,
    )
    .await
    {
        Ok(report) => {
            let log_name = report
                .log_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            bot.send_message(chat_id, report.summary.render(&log_name))
                .await?;
        }
        Err(e) => {
            log::error!("broadcast run failed: {:#}", e);
            bot.send_message(chat_id, format!("❌ Broadcast failed: {e:#}"))
                .await?;
        }
    }

    dialogue
        .update(next_state(current, CaptureEvent::Confirm, true))
        .await?;
    Ok(())
}

/// Confirm/cancel taps that arrive with no pending draft.
pub async fn stale_callback_handler(bot: Bot, q: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(q.id)
        .text("Nothing pending.")
        .await?;
    Ok(())
}

/// Edits the status message in place. Edit failures (deleted message,
/// unchanged text) lose only the visual indicator, never the run.
pub struct LiveProgress {
    bot: Bot,
    chat: ChatId,
    message: MessageId,
}

impl ProgressSink for LiveProgress {
    async fn publish(&self, dispatched: usize, total: usize) {
        let text = format!("📤 Sending… {}/{}", dispatched, total);
        if let Err(e) = self
            .bot
            .edit_message_text(self.chat, self.message, text)
            .await
        {
            if !e.to_string().contains("message is not modified") {
                log::debug!("progress update skipped: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: i32) -> Draft {
        Draft {
            from_chat: ChatId(42),
            message_id: MessageId(id),
        }
    }

    #[test]
    fn non_admin_start_leaves_idle() {
        let next = next_state(BroadcastState::Idle, CaptureEvent::Start, false);
        assert_eq!(next, BroadcastState::Idle);
    }

    #[test]
    fn admin_start_then_content_reaches_pending_confirmation() {
        let awaiting = next_state(BroadcastState::Idle, CaptureEvent::Start, true);
        assert_eq!(awaiting, BroadcastState::AwaitingContent);

        let pending = next_state(awaiting, CaptureEvent::Content(draft(1)), true);
        assert_eq!(
            pending,
            BroadcastState::PendingConfirmation { draft: draft(1) }
        );
    }

    #[test]
    fn commands_do_not_consume_the_capture() {
        let next = next_state(
            BroadcastState::AwaitingContent,
            CaptureEvent::NonQualifying,
            true,
        );
        assert_eq!(next, BroadcastState::AwaitingContent);
    }

    #[test]
    fn content_outside_capture_is_ignored() {
        let next = next_state(BroadcastState::Idle, CaptureEvent::Content(draft(1)), true);
        assert_eq!(next, BroadcastState::Idle);
    }

    #[test]
    fn cancel_discards_draft_so_confirm_is_a_noop() {
        let pending = BroadcastState::PendingConfirmation { draft: draft(7) };
        let idle = next_state(pending, CaptureEvent::Cancel, true);
        assert_eq!(idle, BroadcastState::Idle);

        // With no stored draft, a stray confirm changes nothing.
        assert_eq!(
            next_state(idle, CaptureEvent::Confirm, true),
            BroadcastState::Idle
        );
    }

    #[test]
    fn confirm_sends_and_returns_to_idle() {
        let pending = BroadcastState::PendingConfirmation { draft: draft(7) };
        assert_eq!(
            next_state(pending, CaptureEvent::Confirm, true),
            BroadcastState::Idle
        );
    }

    #[test]
    fn restart_overwrites_a_pending_draft() {
        let pending = BroadcastState::PendingConfirmation { draft: draft(1) };
        let awaiting = next_state(pending, CaptureEvent::Start, true);
        assert_eq!(awaiting, BroadcastState::AwaitingContent);

        let repending = next_state(awaiting, CaptureEvent::Content(draft(2)), true);
        assert_eq!(
            repending,
            BroadcastState::PendingConfirmation { draft: draft(2) }
        );
    }

    #[test]
    fn non_admin_cancel_changes_nothing() {
        let pending = BroadcastState::PendingConfirmation { draft: draft(3) };
        assert_eq!(
            next_state(pending.clone(), CaptureEvent::Cancel, false),
            pending
        );
    }
}
