//! Notification delivery.

pub mod telegram;

pub use telegram::{split_message, Credentials, TelegramNotifier, TELEGRAM_MESSAGE_LIMIT};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("missing bot credentials (set BOT_TOKEN and CHAT_ID)")]
    MissingCredentials,
    #[error("network error: {0}")]
    Network(String),
    #[error("chat API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Destination for a formatted notification.
pub trait NotificationSink {
    fn send(&self, text: &str) -> Result<(), DeliveryError>;
}
