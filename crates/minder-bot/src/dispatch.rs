use crate::registry::SubscriberRegistry;
use crate::router::Router;
use crate::wait::WaitTable;
use crate::{ChatId, InboundEvent, Transport};
use std::future::Future;
use std::sync::Arc;

/// The dispatch engine. One instance per process, shared between the
/// sampling loop and the update pump behind an `Arc`.
pub struct Bot {
    transport: Arc<dyn Transport>,
    registry: SubscriberRegistry,
    waits: WaitTable,
    router: Router,
}

impl Bot {
    pub fn new(transport: Arc<dyn Transport>, router: Router) -> Self {
        Self {
            transport,
            registry: SubscriberRegistry::new(),
            waits: WaitTable::new(),
            router,
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    pub fn waits(&self) -> &WaitTable {
        &self.waits
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Routes one inbound event.
    ///
    /// Plain text from a subscribed sender with a pending wait consumes
    /// that wait: the text is stored under the wait's key, then the hook
    /// runs. Unsolicited text is dropped; a wait armed for a sender who
    /// is not subscribed stays armed. Button presses and commands look
    /// up the frozen router tables; an unmatched command gets the help
    /// text, an unmatched button is dropped.
    pub async fn dispatch(self: Arc<Self>, event: InboundEvent) {
        match event {
            InboundEvent::PlainText { from, text } => {
                if self.registry.is_subscribed(from) {
                    if let Some(wait) = self.waits.take(from) {
                        self.registry.set_attribute(from, &wait.key, &text);
                        tracing::debug!(chat = %from, key = %wait.key, "Captured wait answer");
                        (wait.hook)(
                            Arc::clone(&self),
                            InboundEvent::PlainText { from, text },
                        )
                        .await;
                        return;
                    }
                }
                tracing::debug!(chat = %from, "Dropping unsolicited text");
            }
            InboundEvent::ButtonPress { from, data } => {
                match self.router.button(&data).cloned() {
                    Some(handler) => {
                        tracing::info!(chat = %from, data = %data, "Dispatching button press");
                        handler(
                            Arc::clone(&self),
                            InboundEvent::ButtonPress { from, data },
                        )
                        .await;
                    }
                    None => {
                        tracing::debug!(chat = %from, data = %data, "Unknown button callback")
                    }
                }
            }
            InboundEvent::Command {
                from,
                keyword,
                args,
            } => match self.router.command(&keyword).map(|e| e.handler.clone()) {
                Some(handler) => {
                    tracing::info!(chat = %from, command = %keyword, "Dispatching command");
                    handler(
                        Arc::clone(&self),
                        InboundEvent::Command {
                            from,
                            keyword,
                            args,
                        },
                    )
                    .await;
                }
                None => {
                    tracing::debug!(chat = %from, command = %keyword, "Unknown command");
                    self.reply(from, &self.help_text()).await;
                }
            },
        }
    }

    /// Help text: the built-in `/help` entry first, then every visible
    /// command. `/help` itself is never registered, so it reaches this
    /// text through the unknown-command fallback.
    pub fn help_text(&self) -> String {
        let mut lines = vec![
            "Available commands:".to_string(),
            "/help - Show this message".to_string(),
        ];
        for entry in self.router.visible_commands() {
            lines.push(format!("/{} - {}", entry.keyword, entry.description));
        }
        lines.join("\n")
    }

    /// Arms a one-question dialogue for `id`: the next plain text from
    /// that sender is stored under `key`, then `hook` runs with it.
    pub fn wait_for<H, F>(&self, id: ChatId, key: &str, hook: H)
    where
        H: Fn(Arc<Bot>, InboundEvent) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.waits
            .wait(id, key, Arc::new(move |bot, event| Box::pin(hook(bot, event))));
    }

    /// Sends `text` to a single chat, logging delivery failure.
    pub async fn reply(&self, to: ChatId, text: &str) {
        if let Err(e) = self.transport.send_text(to, text).await {
            tracing::warn!(chat = %to, error = %e, "Failed to send message");
        }
    }

    /// Sends monospace text to a single chat, logging delivery failure.
    pub async fn reply_preformatted(&self, to: ChatId, text: &str) {
        if let Err(e) = self.transport.send_preformatted(to, text).await {
            tracing::warn!(chat = %to, error = %e, "Failed to send preformatted message");
        }
    }

    /// Sends an image to a single chat, logging delivery failure.
    pub async fn reply_image(&self, to: ChatId, bytes: Vec<u8>, filename: &str) {
        if let Err(e) = self.transport.send_image(to, bytes, filename).await {
            tracing::warn!(chat = %to, error = %e, "Failed to send image");
        }
    }

    /// Sends `text` to every subscriber. Delivery failures are logged
    /// and do not stop the fan-out.
    pub async fn broadcast(&self, text: &str) {
        for id in self.registry.chat_ids() {
            if let Err(e) = self.transport.send_text(id, text).await {
                tracing::warn!(chat = %id, error = %e, "Failed to deliver broadcast");
            }
        }
    }
}
