//! Wallet model
//!
//! A tracked address and its last-known transaction count on each chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Last-known (or freshly fetched) transaction count per chain name
pub type TxCounts = BTreeMap<String, u64>;

/// Signed per-chain difference between a fresh snapshot and the last commit
pub type Deltas = BTreeMap<String, i64>;

/// Number of hex digits after the `0x` prefix
const ADDRESS_HEX_LEN: usize = 40;

/// Address parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    #[error("address must have 40 hex digits after 0x: {0}")]
    InvalidLength(String),

    #[error("address contains non-hex characters: {0}")]
    NonHex(String),
}

/// EVM-style wallet address in canonical (lowercase) form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and canonicalize an address
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(trimmed.to_string()))?;

        if hex.len() != ADDRESS_HEX_LEN {
            return Err(AddressError::InvalidLength(trimmed.to_string()));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::NonHex(trimmed.to_string()));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// A watched wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub address: Address,
    /// Last committed transaction count per chain
    #[serde(default)]
    pub last_tx: TxCounts,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl Wallet {
    /// New wallet with no recorded counts
    pub fn new(address: Address) -> Self {
        Self {
            address,
            last_tx: TxCounts::new(),
            added_at: Utc::now(),
        }
    }

    /// Last committed count for a chain; chains never seen count as 0
    pub fn last_known(&self, chain: &str) -> u64 {
        self.last_tx.get(chain).copied().unwrap_or(0)
    }
}
