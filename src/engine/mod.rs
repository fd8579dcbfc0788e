//! Poll cycle engine for Wallet Sentinel
//!
//! On every tick: snapshot the wallet list, fetch every (wallet, chain)
//! count under a shared concurrency bound, diff against the last commit,
//! alert on increases and commit the new baseline per wallet.

pub mod diff;

pub use diff::{evaluate, ChainIssue, WalletCheck};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alert::format_alert;
use crate::config::PollingConfig;
use crate::fetcher::CountFetcher;
use crate::metrics::SentinelMetrics;
use crate::models::{Address, ChainRegistry, TxCounts, Wallet};
use crate::notifications::NotificationService;
use crate::store::{StoreError, WalletStore};

/// Upper bound for the delay between commit attempts
const MAX_COMMIT_BACKOFF: Duration = Duration::from_secs(10);

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between poll cycles
    pub interval: Duration,
    /// Explorer requests allowed in flight at once
    pub max_concurrent_fetches: usize,
    /// Extra attempts after a failed commit
    pub commit_retries: u32,
    /// Delay before the first commit retry, doubled on each attempt
    pub commit_backoff: Duration,
}

impl From<&PollingConfig> for EngineConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_concurrent_fetches: config.max_concurrent_fetches,
            commit_retries: config.commit_retries,
            commit_backoff: Duration::from_millis(config.commit_backoff_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// Sequence number since startup
    pub cycle: u64,
    pub wallets_checked: usize,
    pub alerts_sent: usize,
    pub notification_failures: usize,
    /// Chains whose count was unavailable or regressed
    pub fetch_failures: usize,
    pub commits: usize,
    pub commit_failures: usize,
    /// Wallets left untouched because no chain produced a usable count
    pub skipped_commits: usize,
    pub duration_ms: u64,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Result of asking the engine to run a cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was already running
    Skipped,
}

/// Per-wallet result folded into the cycle report
#[derive(Debug, Default)]
struct WalletOutcome {
    alerted: bool,
    notify_failed: bool,
    fetch_failures: usize,
    committed: bool,
    commit_failed: bool,
}

/// Polling-and-diff engine
pub struct Engine {
    store: Arc<WalletStore>,
    registry: Arc<ChainRegistry>,
    fetcher: Arc<dyn CountFetcher>,
    notifier: Arc<dyn NotificationService>,
    metrics: Arc<SentinelMetrics>,
    config: EngineConfig,
    /// Bounds explorer requests across every wallet and chain
    fetch_permits: Semaphore,
    /// Held for the whole cycle; a second caller skips instead of waiting
    cycle_guard: Mutex<()>,
    cycle_count: AtomicU64,
    last_report: RwLock<Option<CycleReport>>,
}

impl Engine {
    pub fn new(
        store: Arc<WalletStore>,
        registry: Arc<ChainRegistry>,
        fetcher: Arc<dyn CountFetcher>,
        notifier: Arc<dyn NotificationService>,
        metrics: Arc<SentinelMetrics>,
        config: EngineConfig,
    ) -> Self {
        let permits = config.max_concurrent_fetches.max(1);
        Self {
            store,
            registry,
            fetcher,
            notifier,
            metrics,
            config,
            fetch_permits: Semaphore::new(permits),
            cycle_guard: Mutex::new(()),
            cycle_count: AtomicU64::new(0),
            last_report: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<WalletStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ChainRegistry> {
        &self.registry
    }

    /// Report of the most recent completed cycle
    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().clone()
    }

    /// Run one full cycle over every wallet currently tracked
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            tracing::warn!("Previous poll cycle still running, skipping tick");
            self.metrics.cycles_skipped.inc();
            return CycleOutcome::Skipped;
        };

        let started = Instant::now();
        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        let wallets = self.store.list_all().await;
        self.metrics.tracked_wallets.set(wallets.len() as i64);

        tracing::debug!(
            cycle,
            wallet_count = wallets.len(),
            chain_count = self.registry.len(),
            "Polling wallets"
        );

        let outcomes = join_all(wallets.iter().map(|w| self.check_wallet(w))).await;

        let mut report = CycleReport {
            cycle,
            wallets_checked: wallets.len(),
            ..CycleReport::default()
        };
        for outcome in &outcomes {
            report.alerts_sent += usize::from(outcome.alerted);
            report.notification_failures += usize::from(outcome.notify_failed);
            report.fetch_failures += outcome.fetch_failures;
            report.commits += usize::from(outcome.committed);
            report.commit_failures += usize::from(outcome.commit_failed);
            report.skipped_commits +=
                usize::from(!outcome.committed && !outcome.commit_failed);
        }

        let elapsed = started.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;
        report.finished_at = Some(Utc::now());

        self.metrics.cycles.inc();
        self.metrics.wallets_checked.inc_by(wallets.len() as u64);
        self.metrics.cycle_duration.observe(elapsed.as_secs_f64());

        tracing::info!(
            cycle,
            wallets = report.wallets_checked,
            alerts = report.alerts_sent,
            fetch_failures = report.fetch_failures,
            commits = report.commits,
            commit_failures = report.commit_failures,
            duration_ms = report.duration_ms,
            "Poll cycle complete"
        );

        *self.last_report.write() = Some(report.clone());
        CycleOutcome::Completed(report)
    }

    /// Fetch, diff, alert and commit a single wallet
    async fn check_wallet(&self, wallet: &Wallet) -> WalletOutcome {
        let fetches = self.registry.iter().map(|chain| async move {
            // never closed
            let _permit = self.fetch_permits.acquire().await.ok();
            let result = self.fetcher.fetch(&wallet.address, chain).await;
            (chain.name.clone(), result)
        });
        let results = join_all(fetches).await;

        let check = evaluate(wallet, results);
        let mut outcome = WalletOutcome {
            fetch_failures: check.issues.len(),
            ..WalletOutcome::default()
        };

        for issue in &check.issues {
            self.metrics.record_fetch_failure(issue.chain(), issue.kind());
            match issue {
                ChainIssue::Fetch(e) => tracing::warn!(
                    wallet = %wallet.address,
                    chain = %e.chain(),
                    kind = e.kind(),
                    error = %e,
                    "Fetch failed, keeping last-known count"
                ),
                ChainIssue::Regression {
                    chain,
                    fetched,
                    last_known,
                } => tracing::warn!(
                    wallet = %wallet.address,
                    chain = %chain,
                    fetched,
                    last_known,
                    "Fetched count below last-known, ignoring"
                ),
            }
        }

        if check.has_new_tx() {
            tracing::info!(
                wallet = %wallet.address,
                increases = ?check.increased().collect::<Vec<_>>(),
                "New transactions detected"
            );

            let text = format_alert(&wallet.address, &check.snapshot, &check.delta, &self.registry);
            match self.notifier.send(&text).await {
                Ok(()) => {
                    outcome.alerted = true;
                    self.metrics.alerts_sent.inc();
                }
                Err(e) => {
                    // Commit still proceeds; this alert is lost
                    outcome.notify_failed = true;
                    self.metrics.notification_failures.inc();
                    tracing::error!(
                        wallet = %wallet.address,
                        error = %e,
                        "Failed to deliver alert"
                    );
                }
            }
        }

        if !check.should_commit() {
            tracing::debug!(
                wallet = %wallet.address,
                "No usable counts this cycle, keeping stored state"
            );
            return outcome;
        }

        match self.commit_with_retry(&wallet.address, check.snapshot).await {
            Ok(()) => outcome.committed = true,
            Err(e) => {
                outcome.commit_failed = true;
                self.metrics.commit_failures.inc();
                tracing::error!(
                    wallet = %wallet.address,
                    error = %e,
                    "Commit failed, stored counts not advanced"
                );
            }
        }

        outcome
    }

    async fn commit_with_retry(&self, address: &Address, snapshot: TxCounts) -> Result<(), StoreError> {
        let mut attempt = 0;
        let mut backoff = self.config.commit_backoff;

        loop {
            match self.store.commit(address, snapshot.clone()).await {
                Ok(()) => return Ok(()),
                Err(StoreError::UnknownWallet(a)) => return Err(StoreError::UnknownWallet(a)),
                Err(e) if attempt < self.config.commit_retries => {
                    attempt += 1;
                    tracing::warn!(
                        wallet = %address,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Commit failed, retrying with backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_COMMIT_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Spawn the perpetual tick loop
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> EngineHandle {
        let engine = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { engine.run(token).await });

        EngineHandle {
            engine: self,
            cancel,
            task,
        }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            max_concurrent_fetches = self.config.max_concurrent_fetches,
            chains = self.registry.len(),
            "Poll engine started"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Poll engine shutting down");
                    break;
                }
                _ = interval.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::warn!("Shutdown during poll cycle, abandoning in-flight fetches");
                            break;
                        }
                        _ = self.run_cycle() => {}
                    }
                }
            }
        }
    }
}

/// Lifecycle handle for a running engine
pub struct EngineHandle {
    engine: Arc<Engine>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Ask the loop to stop; in-flight fetches are dropped
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to exit
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Poll engine task failed");
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.engine.last_report()
    }
}
