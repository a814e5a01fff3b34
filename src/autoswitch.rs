//! Provider fallback ("autoswitch") across search backends.
//!
//! A [`ProviderChain`] holds providers in priority order. Under
//! [`AutoSwitchStrategy::Smart`] each provider is tried in turn until one
//! returns results; under [`AutoSwitchStrategy::None`] only the first
//! provider runs and its failure propagates.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::provider::{Provider, ProviderKind};
use crate::{Error, Result, SearchResult};

/// Providers tried after the configured primary in `smart` mode.
pub const SMART_FALLBACK_ORDER: [ProviderKind; 5] = [
    ProviderKind::Brave,
    ProviderKind::GoogleSerper,
    ProviderKind::Exa,
    ProviderKind::Travily,
    ProviderKind::DuckDuckGo,
];

/// Fallback policy between providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoSwitchStrategy {
    /// Fall back through other providers on failure or empty results.
    #[default]
    Smart,
    /// Use only the configured provider.
    None,
}

impl AutoSwitchStrategy {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoSwitchStrategy::Smart => "smart",
            AutoSwitchStrategy::None => "none",
        }
    }

    /// Provider kinds to try for `primary`, primary first, without repeats.
    pub fn provider_order(&self, primary: ProviderKind) -> Vec<ProviderKind> {
        let mut order = vec![primary];
        if *self == AutoSwitchStrategy::Smart {
            for kind in SMART_FALLBACK_ORDER {
                if !order.contains(&kind) {
                    order.push(kind);
                }
            }
        }
        order
    }
}

impl From<&str> for AutoSwitchStrategy {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "none" => AutoSwitchStrategy::None,
            "smart" => AutoSwitchStrategy::Smart,
            other => {
                debug!("Unknown autoswitch value '{}', using smart", other);
                AutoSwitchStrategy::Smart
            }
        }
    }
}

impl fmt::Display for AutoSwitchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered providers searched under one strategy.
pub struct ProviderChain {
    strategy: AutoSwitchStrategy,
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderChain {
    /// Creates a chain. The first provider is the primary.
    pub fn new(strategy: AutoSwitchStrategy, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            strategy,
            providers,
        }
    }

    /// Returns the strategy.
    pub fn strategy(&self) -> AutoSwitchStrategy {
        self.strategy
    }

    /// Returns provider names in the order they would be tried.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Runs the chain.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let Some(primary) = self.providers.first() else {
            return Err(Error::ProvidersExhausted(Vec::new()));
        };

        if self.strategy == AutoSwitchStrategy::None {
            debug!("Searching {} (autoswitch off)", primary.name());
            return primary.search(query, limit).await;
        }

        let mut failures = Vec::new();
        let mut any_empty = false;

        for (index, provider) in self.providers.iter().enumerate() {
            let name = provider.name();
            if !provider.is_available() {
                debug!("Skipping {}: not available", name);
                failures.push(format!("{}: no API key configured", name));
                continue;
            }

            match provider.search(query, limit).await {
                Ok(results) if !results.is_empty() => {
                    if index > 0 {
                        info!("Autoswitch: {} answered after {} failed", name, primary.name());
                    }
                    debug!("{} returned {} results", name, results.len());
                    return Ok(results);
                }
                Ok(_) => {
                    debug!("{} returned no results", name);
                    any_empty = true;
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", name, e);
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        if any_empty {
            Ok(Vec::new())
        } else {
            Err(Error::ProvidersExhausted(failures))
        }
    }
}
