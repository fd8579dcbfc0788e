//! Wallet store
//!
//! Owns the watched wallet list. All writes go through one lock that is
//! held across the backend write, so registrations from the listener and
//! commits from the poll engine never interleave on the durable record.
//!
//! Writes are persisted before the in-memory list changes: if the backend
//! write fails (or the future is dropped mid-write) the cached list keeps its
//! previous value and the next cycle recomputes the same delta.

pub mod json;
pub mod memory;
pub mod sqlite;

pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::{StorageBackend, StorageConfig};
use crate::models::{Address, TxCounts, Wallet};

/// Persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("wallet not tracked: {0}")]
    UnknownWallet(String),

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for the wallet list
///
/// `insert` and `update` receive the changed wallet. Whole-file backends
/// return `true` from `rewrites_all` and also get the full list as it will
/// look after the change; everyone else gets an empty slice.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Read every stored wallet in insertion order
    async fn load(&self) -> Result<Vec<Wallet>, StoreError>;

    /// Persist a newly registered wallet
    async fn insert(&self, wallet: &Wallet, all: &[Wallet]) -> Result<(), StoreError>;

    /// Persist new counts for an existing wallet
    async fn update(&self, wallet: &Wallet, all: &[Wallet]) -> Result<(), StoreError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Whether writes need the full post-change list
    fn rewrites_all(&self) -> bool {
        false
    }
}

/// Result of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub inserted: bool,
}

/// Single-writer wallet store
pub struct WalletStore {
    backend: Arc<dyn WalletBackend>,
    wallets: RwLock<Vec<Wallet>>,
}

impl WalletStore {
    /// Open the store, loading the full list from the backend
    pub async fn open(backend: Arc<dyn WalletBackend>) -> Result<Self, StoreError> {
        let loaded = backend.load().await?;

        let mut seen = HashSet::new();
        let mut wallets = Vec::with_capacity(loaded.len());
        for wallet in loaded {
            if seen.insert(wallet.address.clone()) {
                wallets.push(wallet);
            } else {
                tracing::warn!(
                    wallet = %wallet.address,
                    "Duplicate wallet in stored list, keeping first record"
                );
            }
        }

        tracing::info!(
            backend = backend.name(),
            wallets = wallets.len(),
            "Wallet store opened"
        );

        Ok(Self {
            backend,
            wallets: RwLock::new(wallets),
        })
    }

    /// Open the backend selected in configuration
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        let backend: Arc<dyn WalletBackend> = match config.backend {
            StorageBackend::Sqlite => Arc::new(SqliteBackend::open(config).await?),
            StorageBackend::Json => Arc::new(JsonFileBackend::new(config.path.clone())),
        };
        Self::open(backend).await
    }

    /// Register an address unless it is already tracked
    pub async fn add_if_absent(&self, address: &Address) -> Result<AddOutcome, StoreError> {
        let mut wallets = self.wallets.write().await;

        if wallets.iter().any(|w| &w.address == address) {
            return Ok(AddOutcome { inserted: false });
        }

        let wallet = Wallet::new(address.clone());
        if self.backend.rewrites_all() {
            let mut next = wallets.clone();
            next.push(wallet.clone());
            self.backend.insert(&wallet, &next).await?;
            *wallets = next;
        } else {
            self.backend.insert(&wallet, &[]).await?;
            wallets.push(wallet);
        }

        tracing::info!(wallet = %address, total = wallets.len(), "Saved new wallet");
        Ok(AddOutcome { inserted: true })
    }

    /// Consistent snapshot of every tracked wallet
    pub async fn list_all(&self) -> Vec<Wallet> {
        self.wallets.read().await.clone()
    }

    /// Look up one wallet
    pub async fn get(&self, address: &Address) -> Option<Wallet> {
        self.wallets
            .read()
            .await
            .iter()
            .find(|w| &w.address == address)
            .cloned()
    }

    /// Number of tracked wallets
    pub async fn len(&self) -> usize {
        self.wallets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.wallets.read().await.is_empty()
    }

    /// Replace a wallet's last-known counts and persist before returning
    pub async fn commit(&self, address: &Address, new_counts: TxCounts) -> Result<(), StoreError> {
        let mut wallets = self.wallets.write().await;

        let index = wallets
            .iter()
            .position(|w| &w.address == address)
            .ok_or_else(|| StoreError::UnknownWallet(address.to_string()))?;

        if self.backend.rewrites_all() {
            let mut next = wallets.clone();
            next[index].last_tx = new_counts;
            self.backend.update(&next[index], &next).await?;
            *wallets = next;
        } else {
            let mut updated = wallets[index].clone();
            updated.last_tx = new_counts;
            self.backend.update(&updated, &[]).await?;
            wallets[index] = updated;
        }

        Ok(())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
