//! Telegram Bot API transport for the minder agent.
//!
//! A thin long-polling client over the HTTP Bot API: outbound sends
//! implement the dispatch engine's [`minder_bot::Transport`] trait, and
//! the update pump converts inbound updates into
//! [`minder_bot::InboundEvent`]s on a channel.

pub mod client;
pub mod error;
pub mod types;
pub mod updates;


pub use client::TelegramClient;
pub use error::{Result, TelegramError};
pub use updates::{classify, run_update_pump};
