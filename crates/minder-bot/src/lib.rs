//! Conversational dispatch engine for the minder agent.
//!
//! Inbound chat events are classified by the transport and routed here:
//! a pending wait for the sender consumes plain text first, then button
//! callbacks and slash commands look up their handlers in the frozen
//! [`Router`] tables. Recipients live in the [`SubscriberRegistry`];
//! outbound delivery goes through the [`Transport`] trait so the engine
//! stays independent of any one chat service.

pub mod dispatch;
pub mod registry;
pub mod router;
pub mod wait;

pub use dispatch::Bot;
pub use registry::{Subscriber, SubscriberRegistry};
pub use router::{CommandEntry, Handler, HandlerFuture, Router, RouterBuilder};
pub use wait::{PendingWait, WaitTable};

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Chat identity of a message sender or notification recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One inbound chat event, already classified by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A slash command; `keyword` is lowercased and stripped of the
    /// leading `/` and any `@botname` suffix.
    Command {
        from: ChatId,
        keyword: String,
        args: String,
    },
    /// An inline keyboard button press carrying its callback data.
    ButtonPress { from: ChatId, data: String },
    /// Any other text message.
    PlainText { from: ChatId, text: String },
}

impl InboundEvent {
    /// The sender, regardless of variant.
    pub fn sender(&self) -> ChatId {
        match self {
            Self::Command { from, .. }
            | Self::ButtonPress { from, .. }
            | Self::PlainText { from, .. } => *from,
        }
    }
}

/// Outbound message delivery to a chat service.
///
/// The engine and the command handlers talk to the chat service only
/// through this trait; tests substitute a recording fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a plain text message.
    async fn send_text(&self, to: ChatId, text: &str) -> Result<()>;

    /// Sends monospace text (charts, tables). Transports without rich
    /// formatting fall back to a plain send.
    async fn send_preformatted(&self, to: ChatId, text: &str) -> Result<()> {
        self.send_text(to, text).await
    }

    /// Sends an image with a filename hint.
    async fn send_image(&self, to: ChatId, bytes: Vec<u8>, filename: &str) -> Result<()>;
}
