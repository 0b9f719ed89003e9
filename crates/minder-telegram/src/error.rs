/// Errors from the Telegram Bot API client.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// The HTTP request itself failed (connect, timeout, body read).
    #[error("Telegram: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered with `ok: false`.
    #[error("Telegram: API error {code}: {description}")]
    Api { code: i64, description: String },

    /// The client was built with an empty token.
    #[error("Telegram: bot token is empty")]
    MissingToken,
}

/// Convenience `Result` alias for Telegram client operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
