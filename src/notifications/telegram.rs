//! Telegram notification service
//!
//! Sends alerts via the Telegram Bot API `sendMessage` method.

use super::{NotificationError, NotificationService};
use std::time::Duration;

/// Telegram notifier configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Chat ID to send messages to
    pub chat_id: i64,
    /// Bot API base URL
    pub api_base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

/// Bot API method URL, e.g. `https://api.telegram.org/bot<token>/sendMessage`
pub fn method_url(api_base_url: &str, bot_token: &str, method: &str) -> String {
    format!(
        "{}/bot{}/{}",
        api_base_url.trim_end_matches('/'),
        bot_token,
        method
    )
}

/// Telegram notification service
pub struct TelegramNotifier {
    /// sendMessage endpoint
    url: String,
    /// Chat ID
    chat_id: i64,
    /// HTTP client
    client: reqwest::Client,
    /// Whether a token is configured
    enabled: bool,
}

impl TelegramNotifier {
    /// Create a new Telegram notifier
    pub fn new(config: TelegramConfig) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            url: method_url(&config.api_base_url, &config.bot_token, "sendMessage"),
            chat_id: config.chat_id,
            client,
            enabled: !config.bot_token.is_empty(),
        })
    }

    /// Request body for an alert
    fn payload(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        })
    }
}

#[async_trait::async_trait]
impl NotificationService for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        if !self.enabled {
            return Err(NotificationError::Unavailable(
                "Telegram bot token not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Api { status, body });
        }

        tracing::info!(chat_id = self.chat_id, "Sent Telegram alert");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
