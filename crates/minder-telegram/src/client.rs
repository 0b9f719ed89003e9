use crate::error::{Result, TelegramError};
use crate::types::{ApiResponse, Message, Update};
use async_trait::async_trait;
use minder_bot::{ChatId, Transport};
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// Long-polling Bot API client. Cheap to share behind an `Arc`; the
/// underlying `reqwest::Client` pools connections.
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    /// Builds a client for the given bot token.
    pub fn new(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(TelegramError::MissingToken);
        }
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base: format!("https://api.telegram.org/bot{token}"),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    /// Calls a Bot API method and unwraps the response envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T> {
        let response = self
            .http
            .post(self.url(method))
            .json(payload)
            .send()
            .await?;
        let body: ApiResponse<T> = response.json().await?;
        unwrap_envelope(body)?.ok_or(TelegramError::Api {
            code: 0,
            description: "ok response without result".to_string(),
        })
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: Message = self
            .call(
                "sendMessage",
                &json!({ "chat_id": chat_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    /// Sends HTML-formatted text. The caller is responsible for escaping
    /// user content, see [`escape_html`].
    pub async fn send_message_html(&self, chat_id: i64, html: &str) -> Result<()> {
        let _: Message = self
            .call(
                "sendMessage",
                &json!({ "chat_id": chat_id, "text": html, "parse_mode": "HTML" }),
            )
            .await?;
        Ok(())
    }

    /// Sends text with a single row of inline buttons; each pair is
    /// `(label, callback_data)`.
    pub async fn send_message_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[(&str, &str)],
    ) -> Result<()> {
        let row: Vec<Value> = buttons
            .iter()
            .map(|(label, data)| json!({ "text": label, "callback_data": data }))
            .collect();
        let _: Message = self
            .call(
                "sendMessage",
                &json!({
                    "chat_id": chat_id,
                    "text": text,
                    "reply_markup": { "inline_keyboard": [row] },
                }),
            )
            .await?;
        Ok(())
    }

    /// Uploads a photo via multipart form data.
    pub async fn send_photo(&self, chat_id: i64, bytes: Vec<u8>, filename: &str) -> Result<()> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")?;
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);
        let response = self
            .http
            .post(self.url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        let body: ApiResponse<Message> = response.json().await?;
        unwrap_envelope(body)?;
        Ok(())
    }

    /// Long-polls for updates past `offset`. The HTTP timeout is widened
    /// beyond the poll timeout so the server side always wins.
    pub async fn get_updates(&self, offset: i64, poll_timeout_secs: u64) -> Result<Vec<Update>> {
        let response = self
            .http
            .post(self.url("getUpdates"))
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .json(&json!({
                "offset": offset,
                "timeout": poll_timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }))
            .send()
            .await?;
        let body: ApiResponse<Vec<Update>> = response.json().await?;
        Ok(unwrap_envelope(body)?.unwrap_or_default())
    }

    /// Acknowledges a button press so the client stops its spinner.
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_query_id }),
            )
            .await?;
        Ok(())
    }

    /// Publishes the command menu; each pair is `(keyword, description)`.
    pub async fn set_my_commands(&self, commands: &[(String, String)]) -> Result<()> {
        let list: Vec<Value> = commands
            .iter()
            .map(|(keyword, description)| {
                json!({ "command": keyword, "description": description })
            })
            .collect();
        let _: bool = self
            .call("setMyCommands", &json!({ "commands": list }))
            .await?;
        Ok(())
    }
}

/// Pulls the payload out of a Bot API response envelope, turning
/// `ok: false` into [`TelegramError::Api`].
fn unwrap_envelope<T>(body: ApiResponse<T>) -> Result<Option<T>> {
    if body.ok {
        Ok(body.result)
    } else {
        Err(TelegramError::Api {
            code: body.error_code.unwrap_or(0),
            description: body
                .description
                .unwrap_or_else(|| "no description".to_string()),
        })
    }
}

/// Escapes the three characters HTML parse mode reserves.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_text(&self, to: ChatId, text: &str) -> anyhow::Result<()> {
        self.send_message(to.0, text).await?;
        Ok(())
    }

    async fn send_preformatted(&self, to: ChatId, text: &str) -> anyhow::Result<()> {
        let html = format!("<pre>{}</pre>", escape_html(text));
        self.send_message_html(to.0, &html).await?;
        Ok(())
    }

    async fn send_image(&self, to: ChatId, bytes: Vec<u8>, filename: &str) -> anyhow::Result<()> {
        self.send_photo(to.0, bytes, filename).await?;
        Ok(())
    }
}
