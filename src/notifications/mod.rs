//! Notification service for Wallet Sentinel
//!
//! Delivers formatted alert text to the alert channel. Delivery failures
//! are reported to the caller, which logs them; they never undo a commit.

pub mod telegram;

pub use telegram::{TelegramConfig, TelegramNotifier};

use thiserror::Error;

/// Alert delivery errors
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// Notification service trait
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Send alert text to the configured channel
    async fn send(&self, text: &str) -> Result<(), NotificationError>;

    /// Check if the service is enabled
    fn is_enabled(&self) -> bool;
}

/// Writes alerts to the log when no alert chat is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl NotificationService for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        tracing::info!(alert = %text, "Alert (no alert chat configured)");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
