//! `wallets.json` backend
//!
//! Flat file layout: an array of
//! `{ "address": ..., "lastTx": { chain: count } }` records, where older
//! files may also hold bare address strings. Every change rewrites the whole
//! file through a temp file in the same directory followed by a rename, so a
//! crash mid-write leaves the previous file intact.

use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{StoreError, WalletBackend};
use crate::models::{Address, Wallet};

/// A stored entry: full record or legacy bare address
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Record(Wallet),
    Bare(String),
}

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_all(&self, all: &[Wallet]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(all)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &body))
            .await
            .map_err(|e| StoreError::Unavailable(format!("write task failed: {}", e)))?
    }
}

fn write_atomically(path: &Path, body: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl WalletBackend for JsonFileBackend {
    async fn load(&self) -> Result<Vec<Wallet>, StoreError> {
        if !tokio::fs::try_exists(&self.path).await? {
            tracing::info!(path = %self.path.display(), "Wallet file not found, starting empty");
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<StoredEntry> = serde_json::from_str(&raw)?;
        entries
            .into_iter()
            .map(|entry| match entry {
                StoredEntry::Record(wallet) => Ok(wallet),
                StoredEntry::Bare(raw) => Address::parse(&raw)
                    .map(Wallet::new)
                    .map_err(|e| StoreError::InvalidRecord(e.to_string())),
            })
            .collect()
    }

    async fn insert(&self, _wallet: &Wallet, all: &[Wallet]) -> Result<(), StoreError> {
        self.write_all(all).await
    }

    async fn update(&self, _wallet: &Wallet, all: &[Wallet]) -> Result<(), StoreError> {
        self.write_all(all).await
    }

    fn name(&self) -> &'static str {
        "json"
    }

    fn rewrites_all(&self) -> bool {
        true
    }
}
