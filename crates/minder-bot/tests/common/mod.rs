#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use minder_bot::{ChatId, Transport};
use std::sync::Mutex;

/// One outbound message recorded by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { to: ChatId, text: String },
    Preformatted { to: ChatId, text: String },
    Image { to: ChatId, filename: String, len: usize },
}

/// Transport fake that records every send. Chats listed in `fail_for`
/// error instead of recording.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    fail_for: Vec<ChatId>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(ids: &[ChatId]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: ids.to_vec(),
        }
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }

    /// Texts recorded for `to`, in send order (drains nothing).
    pub fn texts_to(&self, to: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { to: t, text } if *t == to => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, to: ChatId, text: &str) -> Result<()> {
        if self.fail_for.contains(&to) {
            anyhow::bail!("simulated delivery failure to {to}");
        }
        self.sent.lock().unwrap().push(Sent::Text {
            to,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_preformatted(&self, to: ChatId, text: &str) -> Result<()> {
        if self.fail_for.contains(&to) {
            anyhow::bail!("simulated delivery failure to {to}");
        }
        self.sent.lock().unwrap().push(Sent::Preformatted {
            to,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_image(&self, to: ChatId, bytes: Vec<u8>, filename: &str) -> Result<()> {
        if self.fail_for.contains(&to) {
            anyhow::bail!("simulated delivery failure to {to}");
        }
        self.sent.lock().unwrap().push(Sent::Image {
            to,
            filename: filename.to_string(),
            len: bytes.len(),
        });
        Ok(())
    }
}
