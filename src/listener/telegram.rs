//! Telegram Bot API long-poll source
//!
//! Calls `getUpdates` with a long-poll timeout and turns text messages and
//! channel posts into `InboundMessage`s. A 409 response means another
//! process is polling with the same token.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{InboundMessage, ListenerError, UpdateSource};
use crate::notifications::telegram::method_url;

/// Marker Telegram puts in 409 descriptions
const CONFLICT_MARKER: &str = "terminated by other getUpdates request";

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    /// Decoded one update at a time
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    channel_post: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Parsed `getUpdates` batch
#[derive(Debug, Default, PartialEq)]
pub struct UpdateBatch {
    pub messages: Vec<InboundMessage>,
    /// Highest update id seen, if any
    pub last_update_id: Option<i64>,
}

/// Parse a `getUpdates` response body
pub fn parse_updates(status: u16, body: &str) -> Result<UpdateBatch, ListenerError> {
    let response: UpdatesResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(_) if status == 409 => return Err(ListenerError::Conflict(body.to_string())),
        Err(e) => return Err(ListenerError::Parse(e)),
    };

    if !response.ok || !(200..300).contains(&status) {
        let description = response.description.unwrap_or_default();
        let code = response.error_code.unwrap_or(status);
        if code == 409 || description.contains(CONFLICT_MARKER) {
            return Err(ListenerError::Conflict(description));
        }
        return Err(ListenerError::Api {
            status: code,
            description,
        });
    }

    let mut batch = UpdateBatch::default();
    for raw in response.result {
        // Advance past every update with an id, even ones we cannot read
        if let Some(update_id) = raw.get("update_id").and_then(Value::as_i64) {
            batch.last_update_id = Some(batch.last_update_id.map_or(update_id, |id| id.max(update_id)));
        }

        let update: Update = match serde_json::from_value(raw) {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed update");
                continue;
            }
        };

        let Some(message) = update.message.or(update.channel_post) else {
            continue;
        };
        let Some(text) = message.text.or(message.caption) else {
            continue;
        };
        batch.messages.push(InboundMessage {
            chat_id: message.chat.id,
            text,
        });
    }

    Ok(batch)
}

/// Long-polling `getUpdates` client
pub struct TelegramPoller {
    client: reqwest::Client,
    url: String,
    long_poll_timeout_secs: u64,
    offset: Option<i64>,
}

impl TelegramPoller {
    pub fn new(
        api_base_url: &str,
        bot_token: &str,
        long_poll_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        // Leave headroom over the server-side long-poll timeout
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(long_poll_timeout_secs + 10))
            .build()?;

        Ok(Self {
            client,
            url: method_url(api_base_url, bot_token, "getUpdates"),
            long_poll_timeout_secs,
            offset: None,
        })
    }
}

#[async_trait::async_trait]
impl UpdateSource for TelegramPoller {
    async fn poll(&mut self) -> Result<Vec<InboundMessage>, ListenerError> {
        let mut body = serde_json::json!({
            "timeout": self.long_poll_timeout_secs,
            "allowed_updates": ["message", "channel_post"],
        });
        if let Some(offset) = self.offset {
            body["offset"] = serde_json::json!(offset);
        }

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let batch = parse_updates(status, &text)?;
        if let Some(last) = batch.last_update_id {
            self.offset = Some(last + 1);
        }
        Ok(batch.messages)
    }
}
