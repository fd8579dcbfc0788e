//! In-memory wallet backend
//!
//! Used by tests and by the engine's own unit tests. Row-oriented like the
//! SQLite backend. Writes can be made to fail on demand to exercise the
//! persistence-error paths.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{StoreError, WalletBackend};
use crate::models::Wallet;

#[derive(Default)]
pub struct MemoryBackend {
    wallets: Mutex<Vec<Wallet>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with stored wallets
    pub fn with_wallets(wallets: Vec<Wallet>) -> Self {
        Self {
            wallets: Mutex::new(wallets),
            ..Self::default()
        }
    }

    /// Make every subsequent write fail with `StoreError::Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current persisted contents
    pub fn persisted(&self) -> Vec<Wallet> {
        self.wallets.lock().clone()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WalletBackend for MemoryBackend {
    async fn load(&self) -> Result<Vec<Wallet>, StoreError> {
        Ok(self.persisted())
    }

    async fn insert(&self, wallet: &Wallet, _all: &[Wallet]) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut wallets = self.wallets.lock();
        if !wallets.iter().any(|w| w.address == wallet.address) {
            wallets.push(wallet.clone());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, wallet: &Wallet, _all: &[Wallet]) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut wallets = self.wallets.lock();
        let stored = wallets
            .iter_mut()
            .find(|w| w.address == wallet.address)
            .ok_or_else(|| StoreError::UnknownWallet(wallet.address.to_string()))?;
        stored.last_tx = wallet.last_tx.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
