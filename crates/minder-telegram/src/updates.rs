//! Inbound update handling: classification into dispatch events and the
//! long-poll pump feeding them to the agent.

use crate::client::TelegramClient;
use crate::types::Update;
use minder_bot::{ChatId, InboundEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Converts one update into a dispatch event.
///
/// Slash-command text becomes [`InboundEvent::Command`] with the keyword
/// lowercased and any `@botname` suffix stripped; callback queries
/// become [`InboundEvent::ButtonPress`]; other text passes through as
/// [`InboundEvent::PlainText`]. Updates without usable text or data
/// (stickers, photos, joins) yield `None`.
pub fn classify(update: Update) -> Option<InboundEvent> {
    if let Some(callback) = update.callback_query {
        let from = ChatId(callback.message?.chat.id);
        let data = callback.data?;
        return Some(InboundEvent::ButtonPress { from, data });
    }

    let message = update.message?;
    let from = ChatId(message.chat.id);
    let text = message.text?;

    if let Some(stripped) = text.strip_prefix('/') {
        let (keyword, args) = split_command(stripped);
        if keyword.is_empty() {
            return Some(InboundEvent::PlainText { from, text });
        }
        return Some(InboundEvent::Command {
            from,
            keyword,
            args,
        });
    }

    Some(InboundEvent::PlainText { from, text })
}

/// Splits `"set@minderbot cpu 75"` into `("set", "cpu 75")`.
fn split_command(stripped: &str) -> (String, String) {
    let mut parts = stripped.splitn(2, char::is_whitespace);
    let token = parts.next().unwrap_or_default();
    let keyword = token
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let args = parts.next().unwrap_or_default().trim().to_string();
    (keyword, args)
}

/// Polls the Bot API forever and feeds classified events into `tx`.
///
/// Poll failures are logged and retried after a short pause. The pump
/// stops only when the receiving side of the channel is gone.
pub async fn run_update_pump(
    client: Arc<TelegramClient>,
    tx: mpsc::Sender<InboundEvent>,
    poll_timeout_secs: u64,
) {
    let mut offset = 0i64;
    loop {
        match client.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => {
                for update in updates {
                    let update_id = update.update_id;
                    offset = offset.max(update_id + 1);
                    let callback_id = update.callback_query.as_ref().map(|c| c.id.clone());
                    if let Some(id) = callback_id {
                        // Best effort: a failed ack only leaves the
                        // client spinner running.
                        if let Err(e) = client.answer_callback_query(&id).await {
                            tracing::debug!(error = %e, "Failed to answer callback query");
                        }
                    }
                    let Some(event) = classify(update) else {
                        tracing::debug!(update_id, "Ignoring update without usable text or data");
                        continue;
                    };
                    if tx.send(event).await.is_err() {
                        tracing::info!("Event channel closed, stopping update pump");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Polling for updates failed");
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}
