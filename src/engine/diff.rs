//! Per-wallet delta computation
//!
//! Folds one wallet's fetch results into a snapshot and deltas. Failed
//! fetches and counts below the last-known value keep the last-known value,
//! so they contribute a zero delta and are never committed as a regression.

use crate::fetcher::FetchError;
use crate::models::{Deltas, TxCounts, Wallet};

/// Why a chain's fresh count was not used this cycle
#[derive(Debug)]
pub enum ChainIssue {
    /// The fetch itself failed
    Fetch(FetchError),
    /// Count went backwards (stale explorer page, parse glitch)
    Regression { chain: String, fetched: u64, last_known: u64 },
}

impl ChainIssue {
    pub fn chain(&self) -> &str {
        match self {
            Self::Fetch(e) => e.chain(),
            Self::Regression { chain, .. } => chain,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Regression { .. } => "regression",
        }
    }
}

/// Outcome of checking every chain for one wallet
#[derive(Debug)]
pub struct WalletCheck {
    /// Counts to commit: fresh values where usable, last-known otherwise
    pub snapshot: TxCounts,
    /// `snapshot[c] - last_tx[c]` for every fetched chain
    pub delta: Deltas,
    /// Chains whose fresh count was accepted
    pub succeeded: usize,
    pub issues: Vec<ChainIssue>,
}

impl WalletCheck {
    /// True when any chain shows a strict increase
    pub fn has_new_tx(&self) -> bool {
        self.delta.values().any(|d| *d > 0)
    }

    /// Commit whenever at least one chain produced a usable count
    pub fn should_commit(&self) -> bool {
        self.succeeded > 0
    }

    /// Chains with a positive delta, in name order
    pub fn increased(&self) -> impl Iterator<Item = (&str, i64)> {
        self.delta
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(c, d)| (c.as_str(), *d))
    }
}

/// Combine fetch results with the wallet's last committed counts.
///
/// Counts for chains that are not part of `results` (e.g. dropped from the
/// chain list) are carried over unchanged.
pub fn evaluate(
    wallet: &Wallet,
    results: impl IntoIterator<Item = (String, Result<u64, FetchError>)>,
) -> WalletCheck {
    let mut snapshot = wallet.last_tx.clone();
    let mut delta = Deltas::new();
    let mut succeeded = 0;
    let mut issues = Vec::new();

    for (chain, result) in results {
        let last_known = wallet.last_known(&chain);

        match result {
            Ok(fetched) if fetched < last_known => {
                delta.insert(chain.clone(), 0);
                issues.push(ChainIssue::Regression {
                    chain,
                    fetched,
                    last_known,
                });
            }
            Ok(fetched) => {
                let diff = i64::try_from(fetched - last_known).unwrap_or(i64::MAX);
                delta.insert(chain.clone(), diff);
                snapshot.insert(chain, fetched);
                succeeded += 1;
            }
            Err(e) => {
                delta.insert(chain, 0);
                issues.push(ChainIssue::Fetch(e));
            }
        }
    }

    WalletCheck {
        snapshot,
        delta,
        succeeded,
        issues,
    }
}
