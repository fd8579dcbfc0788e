//! Configuration management for Wallet Sentinel
//!
//! Loads configuration from YAML files and environment variables.
//! Environment variables override YAML values.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Health/metrics HTTP server
    #[serde(default)]
    pub server: ServerConfig,
    /// Telegram bot credentials and chat ids
    #[serde(default)]
    pub telegram: TelegramSettings,
    /// Poll cycle settings
    #[serde(default)]
    pub polling: PollingConfig,
    /// Wallet list persistence
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chain list location
    #[serde(default)]
    pub chains: ChainsConfig,
    /// Inbound listener settings
    #[serde(default)]
    pub listener: ListenerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Serve /health and /metrics
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Telegram configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    /// Bot token from @BotFather
    #[serde(default)]
    pub bot_token: String,
    /// Chat the listener watches for addresses
    #[serde(default)]
    pub source_chat_id: Option<i64>,
    /// Chat alerts are sent to
    #[serde(default)]
    pub alert_chat_id: Option<i64>,
    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_base_url: String,
    /// Timeout for sendMessage calls (seconds)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_send_timeout() -> u64 {
    10
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            source_chat_id: None,
            alert_chat_id: None,
            api_base_url: default_telegram_api_url(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Poll cycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Interval between poll cycles (seconds)
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Maximum explorer requests in flight across all wallets and chains
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Explorer request timeout (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// User-Agent sent to explorers
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Extra attempts after a failed commit
    #[serde(default = "default_commit_retries")]
    pub commit_retries: u32,
    /// Initial delay between commit attempts (milliseconds)
    #[serde(default = "default_commit_backoff")]
    pub commit_backoff_ms: u64,
}

fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

fn default_max_concurrent_fetches() -> usize {
    5
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("wallet-sentinel/{}", env!("CARGO_PKG_VERSION"))
}

fn default_commit_retries() -> u32 {
    3
}

fn default_commit_backoff() -> u64 {
    500
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            commit_retries: default_commit_retries(),
            commit_backoff_ms: default_commit_backoff(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Which backend holds the wallet list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database (WAL mode)
    #[default]
    Sqlite,
    /// Plain `wallets.json` file, rewritten atomically
    Json,
}

/// Wallet list persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Path to the SQLite database or JSON file
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Maximum connections in pool (SQLite only)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/wallets.db")
}

fn default_max_connections() -> u32 {
    2
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Chain list configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChainsConfig {
    #[serde(default = "default_chains_path")]
    pub path: PathBuf,
}

fn default_chains_path() -> PathBuf {
    PathBuf::from("chains.json")
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            path: default_chains_path(),
        }
    }
}

/// Inbound listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// Run the Telegram long-poll listener
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// getUpdates long-poll timeout (seconds)
    #[serde(default = "default_long_poll_timeout")]
    pub long_poll_timeout_secs: u64,
    /// First reconnect delay (milliseconds)
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_ms: u64,
    /// Reconnect delay ceiling (milliseconds)
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_ms: u64,
    /// Consecutive failures before the listener gives up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Capacity of the inbound message channel
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_long_poll_timeout() -> u64 {
    30
}

fn default_reconnect_initial() -> u64 {
    5000
}

fn default_reconnect_max() -> u64 {
    60_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            long_poll_timeout_secs: default_long_poll_timeout(),
            reconnect_initial_ms: default_reconnect_initial(),
            reconnect_max_ms: default_reconnect_max(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SENTINEL_*)
    /// 2. config/config.yaml (if exists)
    /// 3. config.yaml (if exists)
    /// 4. Legacy BOT_TOKEN / SOURCE_CHANNEL / ALERT_CHANNEL variables
    /// 5. Default values
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(Self::environment())
    }

    /// `SENTINEL_POLLING__INTERVAL_SECS=60` -> `polling.interval_secs = 60`.
    ///
    /// The prefix is joined with a single underscore; only nested keys use
    /// the double-underscore separator.
    fn environment() -> Environment {
        Environment::with_prefix("SENTINEL")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(environment: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", 8080)?
            .set_default("polling.interval_secs", 300)?
            .set_default("polling.max_concurrent_fetches", 5)?
            .set_default("polling.fetch_timeout_secs", 15)?
            .set_default("storage.backend", "sqlite")?
            .set_default("storage.path", "data/wallets.db")?
            .set_default("chains.path", "chains.json")?;

        if let Ok(token) = std::env::var("BOT_TOKEN") {
            builder = builder.set_default("telegram.bot_token", token)?;
        }
        if let Ok(chat) = std::env::var("SOURCE_CHANNEL") {
            builder = builder.set_default("telegram.source_chat_id", chat)?;
        }
        if let Ok(chat) = std::env::var("ALERT_CHANNEL") {
            builder = builder.set_default("telegram.alert_chat_id", chat)?;
        }

        let config = builder
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            .add_source(environment)
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::Message(
                "polling.interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.polling.max_concurrent_fetches == 0 {
            return Err(ConfigError::Message(
                "polling.max_concurrent_fetches must be greater than 0".to_string(),
            ));
        }

        if self.polling.fetch_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "polling.fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }

        let needs_token = self.listener.enabled || self.telegram.alert_chat_id.is_some();
        if needs_token && self.telegram.bot_token.is_empty() {
            return Err(ConfigError::Message(
                "Bot token must be set via SENTINEL_TELEGRAM__BOT_TOKEN or BOT_TOKEN".to_string(),
            ));
        }

        if self.listener.enabled && self.telegram.source_chat_id.is_none() {
            return Err(ConfigError::Message(
                "Listener enabled but telegram.source_chat_id is not set".to_string(),
            ));
        }

        if self.listener.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "listener.queue_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
