//! Chain registry
//!
//! Explorer sources loaded once at startup from `chains.json`. Each entry
//! has a unique name, an explorer URL template and a selector used to pull
//! the transaction count out of the explorer page. Selectors are CSS by
//! default; `"kind": "regex"` switches an entry to a regular expression.

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::wallet::Address;

/// Placeholder substituted with the wallet address in explorer templates
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Chain configuration errors
#[derive(Error, Debug)]
pub enum ChainConfigError {
    #[error("failed to read chain file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse chain file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("chain name must not be empty")]
    EmptyName,

    #[error("duplicate chain name: {0}")]
    DuplicateName(String),

    #[error("chain {chain}: explorer template must not be empty")]
    EmptyExplorer { chain: String },

    #[error("chain {chain}: invalid selector: {source}")]
    InvalidSelector {
        chain: String,
        #[source]
        source: SelectorError,
    },
}

/// Selector compilation errors
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("bad regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("bad CSS selector: {0}")]
    Css(String),
}

/// How a chain's `selector` string is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    #[default]
    Css,
    Regex,
}

/// Raw chain record as stored in `chains.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub name: String,
    /// Explorer URL template, e.g. `https://etherscan.io/address/`
    pub explorer: String,
    /// CSS selector or regex locating the transaction count
    pub selector: String,
    #[serde(default)]
    pub kind: SelectorKind,
}

/// Rule that extracts a transaction count from fetched page content
#[derive(Debug, Clone)]
pub enum ExtractionRule {
    /// Text of every element matching the selector, concatenated
    Css { selector: Selector, source: String },
    /// Capture group 1 of the first match, or the whole match
    Regex(Regex),
}

impl ExtractionRule {
    pub fn new(kind: SelectorKind, pattern: &str) -> Result<Self, SelectorError> {
        match kind {
            SelectorKind::Css => {
                let selector = Selector::parse(pattern).map_err(|e| SelectorError::Css(e.to_string()))?;
                Ok(Self::Css {
                    selector,
                    source: pattern.to_string(),
                })
            }
            SelectorKind::Regex => Ok(Self::Regex(Regex::new(pattern)?)),
        }
    }

    pub fn kind(&self) -> SelectorKind {
        match self {
            Self::Css { .. } => SelectorKind::Css,
            Self::Regex(_) => SelectorKind::Regex,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Css { source, .. } => source,
            Self::Regex(pattern) => pattern.as_str(),
        }
    }

    /// Extract a count from page content.
    ///
    /// Every non-digit character is dropped from the selected text before
    /// parsing, so `"1,234 transactions"` yields 1234. Returns `None` when
    /// nothing is selected or the selected text holds no digits.
    pub fn extract(&self, content: &str) -> Option<u64> {
        match self {
            Self::Css { selector, .. } => {
                let document = Html::parse_document(content);
                let text: String = document.select(selector).flat_map(|el| el.text()).collect();
                parse_digits(&text)
            }
            Self::Regex(pattern) => {
                let captures = pattern.captures(content)?;
                let matched = captures.get(1).or_else(|| captures.get(0))?;
                parse_digits(matched.as_str())
            }
        }
    }
}

fn parse_digits(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// A configured explorer source
#[derive(Debug, Clone)]
pub struct Chain {
    pub name: String,
    pub explorer: String,
    pub rule: ExtractionRule,
}

impl Chain {
    pub fn from_spec(spec: ChainSpec) -> Result<Self, ChainConfigError> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err(ChainConfigError::EmptyName);
        }
        if spec.explorer.trim().is_empty() {
            return Err(ChainConfigError::EmptyExplorer { chain: name });
        }

        let rule = ExtractionRule::new(spec.kind, &spec.selector).map_err(|source| {
            ChainConfigError::InvalidSelector {
                chain: name.clone(),
                source,
            }
        })?;

        Ok(Self {
            name,
            explorer: spec.explorer.trim().to_string(),
            rule,
        })
    }

    /// Explorer URL for an address.
    ///
    /// `{address}` in the template is substituted; templates without the
    /// placeholder get the address appended.
    pub fn lookup_url(&self, address: &Address) -> String {
        if self.explorer.contains(ADDRESS_PLACEHOLDER) {
            self.explorer.replace(ADDRESS_PLACEHOLDER, address.as_str())
        } else {
            format!("{}{}", self.explorer, address)
        }
    }
}

/// Ordered, immutable set of chains
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<Chain>,
}

impl ChainRegistry {
    /// Build a registry, preserving the configured order
    pub fn from_specs(specs: Vec<ChainSpec>) -> Result<Self, ChainConfigError> {
        let mut seen = HashSet::new();
        let mut chains = Vec::with_capacity(specs.len());

        for spec in specs {
            let chain = Chain::from_spec(spec)?;
            if !seen.insert(chain.name.clone()) {
                return Err(ChainConfigError::DuplicateName(chain.name));
            }
            chains.push(chain);
        }

        Ok(Self { chains })
    }

    /// Load `chains.json`; a missing file yields an empty registry
    pub fn load(path: &Path) -> Result<Self, ChainConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Chain file not found, no chains configured");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ChainConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let specs: Vec<ChainSpec> = serde_json::from_str(&raw)?;
        let registry = Self::from_specs(specs)?;

        tracing::info!(
            path = %path.display(),
            chains = ?registry.names().collect::<Vec<_>>(),
            "Chain registry loaded"
        );
        Ok(registry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chain> {
        self.chains.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chains.iter().map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Chain> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
