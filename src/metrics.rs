//! Prometheus metrics for Wallet Sentinel
//!
//! - Poll cycle counters and duration histogram
//! - Fetch failures by chain and kind
//! - Alert delivery and commit outcomes
//! - Registrations and tracked wallet gauge

use prometheus::{
    core::Collector, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Metrics state
pub struct SentinelMetrics {
    /// Prometheus registry
    registry: Registry,
    /// Completed poll cycles
    pub cycles: IntCounter,
    /// Ticks skipped because a cycle was still running
    pub cycles_skipped: IntCounter,
    /// Wallets checked across all cycles
    pub wallets_checked: IntCounter,
    /// Failed or anomalous fetches, labelled by chain and kind
    pub fetch_failures: IntCounterVec,
    /// Alerts handed to the notifier successfully
    pub alerts_sent: IntCounter,
    /// Alerts the notifier failed to deliver
    pub notification_failures: IntCounter,
    /// Commits that failed after all retries
    pub commit_failures: IntCounter,
    /// New wallets registered by the listener
    pub registrations: IntCounter,
    /// Currently tracked wallets
    pub tracked_wallets: IntGauge,
    /// Poll cycle duration (seconds)
    pub cycle_duration: Histogram,
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl SentinelMetrics {
    /// Create a new metrics state with all metrics registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "sentinel_cycles_total",
                "Completed poll cycles",
            ))?,
        )?;

        let cycles_skipped = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "sentinel_cycles_skipped_total",
                "Poll ticks skipped because the previous cycle was still running",
            ))?,
        )?;

        let wallets_checked = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "sentinel_wallets_checked_total",
                "Wallets checked across all cycles",
            ))?,
        )?;

        let fetch_failures = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "sentinel_fetch_failures_total",
                    "Explorer fetches that failed or returned an anomalous count",
                ),
                &["chain", "kind"],
            )?,
        )?;

        let alerts_sent = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "sentinel_alerts_sent_total",
                "Alerts delivered to the notifier",
            ))?,
        )?;

        let notification_failures = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "sentinel_notification_failures_total",
                "Alerts the notifier failed to deliver",
            ))?,
        )?;

        let commit_failures = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "sentinel_commit_failures_total",
                "Wallet commits that failed after all retries",
            ))?,
        )?;

        let registrations = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "sentinel_registrations_total",
                "New wallets registered from the inbound stream",
            ))?,
        )?;

        let tracked_wallets = register(
            &registry,
            IntGauge::with_opts(Opts::new(
                "sentinel_tracked_wallets",
                "Number of tracked wallets",
            ))?,
        )?;

        let cycle_duration = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "sentinel_cycle_duration_seconds",
                    "Poll cycle duration in seconds",
                )
                .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
            )?,
        )?;

        Ok(Self {
            registry,
            cycles,
            cycles_skipped,
            wallets_checked,
            fetch_failures,
            alerts_sent,
            notification_failures,
            commit_failures,
            registrations,
            tracked_wallets,
            cycle_duration,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn record_fetch_failure(&self, chain: &str, kind: &str) {
        self.fetch_failures.with_label_values(&[chain, kind]).inc();
    }
}
