//! SQLite wallet backend
//!
//! One row per wallet; `last_tx` is stored as a JSON object keyed by chain
//! name. The pool runs in WAL mode with synchronous=FULL so that every
//! committed write survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use super::{StoreError, WalletBackend};
use crate::config::StorageConfig;
use crate::models::{Address, TxCounts, Wallet};

/// Type alias for the SQLite connection pool
pub type DbPool = Pool<Sqlite>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    address TEXT PRIMARY KEY NOT NULL,
    last_tx TEXT NOT NULL DEFAULT '{}',
    added_at TEXT NOT NULL,
    updated_at TEXT
)
"#;

pub struct SqliteBackend {
    pool: DbPool,
}

impl SqliteBackend {
    /// Open (or create) the database file and apply the schema
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!("Created database directory: {:?}", parent);
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", config.path.display());
        let connect_options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_options)
            .await?;

        tracing::info!(
            "Database pool initialized: {:?} (max {} connections)",
            config.path,
            config.max_connections
        );

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying the schema
    pub async fn from_pool(pool: DbPool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl WalletBackend for SqliteBackend {
    async fn load(&self) -> Result<Vec<Wallet>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT address, last_tx, added_at FROM wallets ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(address, last_tx, added_at)| {
                let address = Address::parse(&address)
                    .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
                let last_tx: TxCounts = serde_json::from_str(&last_tx)?;
                Ok(Wallet {
                    address,
                    last_tx,
                    added_at,
                })
            })
            .collect()
    }

    async fn insert(&self, wallet: &Wallet, _all: &[Wallet]) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO wallets (address, last_tx, added_at) VALUES (?, ?, ?) \
             ON CONFLICT(address) DO NOTHING",
        )
        .bind(wallet.address.as_str())
        .bind(serde_json::to_string(&wallet.last_tx)?)
        .bind(wallet.added_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, wallet: &Wallet, _all: &[Wallet]) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE wallets SET last_tx = ?, updated_at = ? WHERE address = ?")
            .bind(serde_json::to_string(&wallet.last_tx)?)
            .bind(Utc::now())
            .bind(wallet.address.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownWallet(wallet.address.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
