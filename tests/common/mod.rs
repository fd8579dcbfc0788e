//! Shared fakes for engine, listener and store tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use wallet_sentinel::engine::{Engine, EngineConfig};
use wallet_sentinel::fetcher::{CountFetcher, FetchError};
use wallet_sentinel::listener::{InboundMessage, ListenerError, UpdateSource};
use wallet_sentinel::metrics::SentinelMetrics;
use wallet_sentinel::models::{Address, Chain, ChainRegistry, ChainSpec, SelectorKind};
use wallet_sentinel::notifications::{NotificationError, NotificationService};
use wallet_sentinel::store::{MemoryBackend, WalletStore};

pub const WALLET_A: &str = "0x1111111111111111111111111111111111111111";
pub const WALLET_B: &str = "0x2222222222222222222222222222222222222222";

pub fn addr(raw: &str) -> Address {
    Address::parse(raw).unwrap()
}

/// Registry of chains with a simple "N transactions" selector
pub fn registry(names: &[&str]) -> ChainRegistry {
    ChainRegistry::from_specs(
        names
            .iter()
            .map(|name| ChainSpec {
                name: name.to_string(),
                explorer: format!("https://{}.example/address/", name.to_lowercase()),
                selector: r"([\d,]+) transactions".to_string(),
                kind: SelectorKind::Regex,
            })
            .collect(),
    )
    .unwrap()
}

/// Fetcher answering from a table; missing entries fail with HTTP 503
#[derive(Default)]
pub struct ScriptedFetcher {
    counts: Mutex<HashMap<(String, String), u64>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, address: &str, chain: &str, count: u64) {
        self.counts
            .lock()
            .insert((addr(address).to_string(), chain.to_string()), count);
    }

    pub fn fail(&self, address: &str, chain: &str) {
        self.counts
            .lock()
            .remove(&(addr(address).to_string(), chain.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CountFetcher for ScriptedFetcher {
    async fn fetch(&self, address: &Address, chain: &Chain) -> Result<u64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.counts
            .lock()
            .get(&(address.to_string(), chain.name.clone()))
            .copied()
            .ok_or_else(|| FetchError::Status {
                chain: chain.name.clone(),
                address: address.to_string(),
                status: 503,
            })
    }
}

/// Fetcher that parks every call until released
#[derive(Default)]
pub struct GatedFetcher {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl CountFetcher for GatedFetcher {
    async fn fetch(&self, _address: &Address, _chain: &Chain) -> Result<u64, FetchError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(1)
    }
}

/// Fetcher that tracks how many calls are in flight at once
#[derive(Default)]
pub struct PeakFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl PeakFetcher {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CountFetcher for PeakFetcher {
    async fn fetch(&self, _address: &Address, _chain: &Chain) -> Result<u64, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(1)
    }
}

/// Notifier that records every alert text
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Unavailable("chat unreachable".to_string()));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Update source replaying a script, then idling forever
pub struct ScriptedSource {
    script: VecDeque<Result<Vec<InboundMessage>, ListenerError>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<InboundMessage>, ListenerError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn poll(&mut self) -> Result<Vec<InboundMessage>, ListenerError> {
        match self.script.pop_front() {
            Some(next) => next,
            None => std::future::pending().await,
        }
    }
}

pub fn test_engine_config() -> EngineConfig {
    EngineConfig {
        interval: Duration::from_secs(3600),
        max_concurrent_fetches: 4,
        commit_retries: 2,
        commit_backoff: Duration::from_millis(1),
    }
}

/// Everything a poll-cycle test needs
pub struct Harness {
    pub engine: Arc<Engine>,
    pub store: Arc<WalletStore>,
    pub backend: Arc<MemoryBackend>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub metrics: Arc<SentinelMetrics>,
}

impl Harness {
    pub async fn new(chains: &[&str]) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(WalletStore::open(backend.clone()).await.unwrap());
        let fetcher = Arc::new(ScriptedFetcher::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let metrics = Arc::new(SentinelMetrics::new().unwrap());

        let engine = Arc::new(Engine::new(
            store.clone(),
            Arc::new(registry(chains)),
            fetcher.clone(),
            notifier.clone(),
            metrics.clone(),
            test_engine_config(),
        ));

        Self {
            engine,
            store,
            backend,
            fetcher,
            notifier,
            metrics,
        }
    }

    /// Register `address` and seed its stored counts
    pub async fn track(&self, address: &str, counts: &[(&str, u64)]) {
        let a = addr(address);
        self.store.add_if_absent(&a).await.unwrap();
        if !counts.is_empty() {
            let counts = counts.iter().map(|(c, n)| (c.to_string(), *n)).collect();
            self.store.commit(&a, counts).await.unwrap();
        }
    }

    pub async fn count(&self, address: &str, chain: &str) -> u64 {
        self.store
            .get(&addr(address))
            .await
            .unwrap()
            .last_known(chain)
    }
}
