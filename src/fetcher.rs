//! Explorer transaction-count fetcher
//!
//! `CountFetcher` is the seam between the poll engine and the network. The
//! HTTP implementation GETs the chain's explorer page for an address and
//! runs the chain's extraction rule over the body.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Address, Chain};

/// Per-chain fetch failure
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{chain}: request for {address} timed out")]
    Timeout { chain: String, address: String },

    #[error("{chain}: request for {address} failed: {source}")]
    Transport {
        chain: String,
        address: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{chain}: explorer returned HTTP {status} for {address}")]
    Status {
        chain: String,
        address: String,
        status: u16,
    },

    #[error("{chain}: no transaction count found for {address}")]
    Extraction { chain: String, address: String },
}

impl FetchError {
    pub fn chain(&self) -> &str {
        match self {
            Self::Timeout { chain, .. }
            | Self::Transport { chain, .. }
            | Self::Status { chain, .. }
            | Self::Extraction { chain, .. } => chain,
        }
    }

    /// Short classification used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Extraction { .. } => "extraction",
        }
    }

    fn transport(chain: &Chain, address: &Address, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                chain: chain.name.clone(),
                address: address.to_string(),
            }
        } else {
            Self::Transport {
                chain: chain.name.clone(),
                address: address.to_string(),
                source,
            }
        }
    }
}

/// Fetch the current transaction count of an address on a chain
#[async_trait]
pub trait CountFetcher: Send + Sync {
    async fn fetch(&self, address: &Address, chain: &Chain) -> Result<u64, FetchError>;
}

/// Scrapes explorer pages over HTTP
pub struct ExplorerFetcher {
    client: reqwest::Client,
}

impl ExplorerFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl CountFetcher for ExplorerFetcher {
    async fn fetch(&self, address: &Address, chain: &Chain) -> Result<u64, FetchError> {
        let url = chain.lookup_url(address);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::transport(chain, address, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                chain: chain.name.clone(),
                address: address.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::transport(chain, address, e))?;

        let count = chain
            .rule
            .extract(&body)
            .ok_or_else(|| FetchError::Extraction {
                chain: chain.name.clone(),
                address: address.to_string(),
            })?;

        tracing::trace!(chain = %chain.name, wallet = %address, count, "Fetched transaction count");
        Ok(count)
    }
}
