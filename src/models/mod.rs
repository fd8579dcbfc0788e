//! Data models for the sentinel

pub mod chain;
pub mod wallet;

pub use chain::{Chain, ChainConfigError, ChainRegistry, ChainSpec, ExtractionRule, SelectorError, SelectorKind};
pub use wallet::{Address, AddressError, Deltas, TxCounts, Wallet};
