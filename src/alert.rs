//! Alert text formatting
//!
//! Pure function of the wallet, its fresh snapshot and the deltas. Chains
//! appear in registry order.

use std::fmt::Write;

use crate::models::{Address, ChainRegistry, Deltas, TxCounts};

/// Build the alert message for a wallet with new transactions
pub fn format_alert(
    address: &Address,
    snapshot: &TxCounts,
    delta: &Deltas,
    registry: &ChainRegistry,
) -> String {
    let mut msg = String::new();
    let _ = writeln!(msg, "🧠 Transaction Alert Found!");
    let _ = writeln!(msg, "🧾 Address: {}", address);

    for chain in registry.iter() {
        match snapshot.get(&chain.name) {
            Some(count) => {
                let _ = write!(msg, "📊 {}: {} tx", chain.name, count);
                if let Some(d) = delta.get(&chain.name).filter(|d| **d > 0) {
                    let _ = write!(msg, " (+{})", d);
                }
                msg.push('\n');
            }
            None => {
                let _ = writeln!(msg, "📊 {}: n/a", chain.name);
            }
        }
    }

    let _ = writeln!(msg, "🔗 Explorers");
    for chain in registry.iter() {
        let _ = writeln!(msg, "{}: {}", chain.name, chain.lookup_url(address));
    }

    msg
}
