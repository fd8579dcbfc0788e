//! Error types for Wallet Sentinel
//!
//! Each concern keeps its own error enum next to the code that raises it
//! (`FetchError`, `StoreError`, `NotificationError`, `ListenerError`,
//! `ChainConfigError`). `AppError` collects the ones that can stop startup.

use thiserror::Error;

use crate::listener::ListenerError;
use crate::models::ChainConfigError;
use crate::notifications::NotificationError;
use crate::store::StoreError;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Chain list could not be loaded
    #[error("Chain configuration error: {0}")]
    Chains(#[from] ChainConfigError),

    /// Wallet store could not be opened or written
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Notifier setup failed
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Listener could not be built
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
