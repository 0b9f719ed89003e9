#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use minder_bot::{ChatId, Transport};
use minder_probe::Probe;
use std::sync::Mutex;

/// One outbound message recorded by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { to: ChatId, text: String },
    Preformatted { to: ChatId, text: String },
    Image { to: ChatId, filename: String, len: usize },
}

/// Transport fake recording every send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }

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

    pub fn preformatted_to(&self, to: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Preformatted { to: t, text } if *t == to => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, to: ChatId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            to,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_preformatted(&self, to: ChatId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Preformatted {
            to,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_image(&self, to: ChatId, bytes: Vec<u8>, filename: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Image {
            to,
            filename: filename.to_string(),
            len: bytes.len(),
        });
        Ok(())
    }
}

/// Probe that always reads the same value.
pub struct StaticProbe(pub f64);

impl Probe for StaticProbe {
    fn name(&self) -> &str {
        "static"
    }

    fn sample(&mut self) -> Result<f64> {
        Ok(self.0)
    }
}

/// Probe that always fails.
pub struct BrokenProbe;

impl Probe for BrokenProbe {
    fn name(&self) -> &str {
        "broken"
    }

    fn sample(&mut self) -> Result<f64> {
        anyhow::bail!("probe backend unavailable")
    }
}
