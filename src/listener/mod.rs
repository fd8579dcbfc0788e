//! Inbound message listener
//!
//! Watches the source channel for text containing an EVM address and
//! registers each new address with the wallet store. The receive side is a
//! long-poll loop behind `UpdateSource`; registration runs as its own task
//! fed through a bounded channel so a slow store never stalls polling.

pub mod connection;
pub mod telegram;

pub use connection::{BackoffPolicy, ConnectionMachine, ConnectionState};
pub use telegram::TelegramPoller;

use parking_lot::RwLock;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::metrics::SentinelMetrics;
use crate::models::Address;
use crate::store::{AddOutcome, StoreError, WalletStore};

/// Listener errors
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("another poller holds the update stream: {0}")]
    Conflict(String),

    #[error("Telegram API error: {status} - {description}")]
    Api { status: u16, description: String },

    #[error("malformed update response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("gave up after {attempts} consecutive failures")]
    GaveUp { attempts: u32 },
}

/// One text message from a watched chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: String,
}

/// Source of inbound messages
#[async_trait::async_trait]
pub trait UpdateSource: Send {
    /// Wait for the next batch of messages (may be empty)
    async fn poll(&mut self) -> Result<Vec<InboundMessage>, ListenerError>;
}

/// Connection state shared with the health endpoint
pub type SharedConnectionState = Arc<RwLock<ConnectionState>>;

fn address_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    // Word boundaries keep 64-digit transaction hashes from matching
    PATTERN
        .get_or_init(|| Regex::new(r"\b0x[0-9a-fA-F]{40}\b").ok())
        .as_ref()
}

/// First EVM address found in `text`, canonicalized
pub fn extract_address(text: &str) -> Option<Address> {
    address_pattern()?
        .find(text)
        .and_then(|m| Address::parse(m.as_str()).ok())
}

/// Drive `source` until cancelled or the reconnect budget is exhausted.
///
/// Every batch is forwarded to `tx`. Failures move the shared state through
/// `Reconnecting` with exponential backoff; the first successful poll after
/// a failure returns it to `Connected`.
pub async fn run_listener<S: UpdateSource>(
    mut source: S,
    tx: mpsc::Sender<InboundMessage>,
    policy: BackoffPolicy,
    state: SharedConnectionState,
    cancel: CancellationToken,
) -> Result<(), ListenerError> {
    let mut machine = ConnectionMachine::new(policy);
    *state.write() = machine.state();

    tracing::info!("Listener started");

    loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Listener shutting down");
                return Ok(());
            }
            polled = source.poll() => polled,
        };

        match polled {
            Ok(messages) => {
                if machine.state() != ConnectionState::Connected {
                    tracing::info!("Listener reconnected");
                }
                machine.on_success();
                *state.write() = machine.state();

                for message in messages {
                    if tx.send(message).await.is_err() {
                        tracing::warn!("Registration task gone, stopping listener");
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                let Some(delay) = machine.on_failure() else {
                    *state.write() = machine.state();
                    tracing::error!(
                        error = %e,
                        attempts = policy.max_attempts,
                        "Listener failed permanently"
                    );
                    return Err(ListenerError::GaveUp {
                        attempts: policy.max_attempts,
                    });
                };
                let new_state = machine.state();
                *state.write() = new_state;

                if matches!(e, ListenerError::Conflict(_)) {
                    tracing::warn!(
                        error = %e,
                        state = %new_state,
                        delay_ms = delay.as_millis() as u64,
                        "Update stream held by another poller, restarting"
                    );
                } else {
                    tracing::warn!(
                        error = %e,
                        state = %new_state,
                        delay_ms = delay.as_millis() as u64,
                        "Listener poll failed, backing off"
                    );
                }

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Listener shutting down");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Turns source-channel messages into wallet registrations
pub struct RegistrationHandler {
    store: Arc<WalletStore>,
    source_chat_id: i64,
    metrics: Arc<SentinelMetrics>,
}

impl RegistrationHandler {
    pub fn new(store: Arc<WalletStore>, source_chat_id: i64, metrics: Arc<SentinelMetrics>) -> Self {
        Self {
            store,
            source_chat_id,
            metrics,
        }
    }

    /// Register the address in `message`, if any.
    ///
    /// Returns `Ok(None)` for messages from other chats or without an
    /// address.
    pub async fn handle(&self, message: &InboundMessage) -> Result<Option<AddOutcome>, StoreError> {
        if message.chat_id != self.source_chat_id {
            return Ok(None);
        }

        let Some(address) = extract_address(&message.text) else {
            tracing::debug!(chat_id = message.chat_id, "No address in message");
            return Ok(None);
        };

        let outcome = self.store.add_if_absent(&address).await?;
        if outcome.inserted {
            self.metrics.registrations.inc();
            self.metrics.tracked_wallets.set(self.store.len().await as i64);
        } else {
            tracing::debug!(wallet = %address, "Wallet already tracked");
        }

        Ok(Some(outcome))
    }

    /// Consume messages until the channel closes or `cancel` fires
    pub async fn run(self, mut rx: mpsc::Receiver<InboundMessage>, cancel: CancellationToken) {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(m) => m,
                    None => break,
                },
            };

            if let Err(e) = self.handle(&message).await {
                tracing::error!(
                    chat_id = message.chat_id,
                    error = %e,
                    "Failed to register wallet"
                );
            }
        }

        tracing::info!("Registration handler stopped");
    }
}
