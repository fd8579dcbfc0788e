//! Wallet Sentinel Library
//!
//! Watches EVM wallet addresses across block explorers and alerts when a
//! wallet's transaction count goes up. This library exposes core modules
//! for the binary and for tests.

pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod listener;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod store;

// Re-export commonly used types for tests
pub use config::AppConfig;
pub use engine::{CycleOutcome, CycleReport, Engine, EngineConfig, EngineHandle};
pub use error::{AppError, AppResult};
pub use fetcher::{CountFetcher, ExplorerFetcher, FetchError};
pub use listener::{ConnectionState, InboundMessage, RegistrationHandler};
pub use metrics::SentinelMetrics;
pub use models::{Address, Chain, ChainRegistry, TxCounts, Wallet};
pub use notifications::{LogNotifier, NotificationError, NotificationService};
pub use store::{StoreError, WalletStore};
