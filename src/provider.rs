//! Search provider trait and provider identities.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, SearchResult};

/// A named search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// DuckDuckGo (HTML endpoint / Instant Answer API).
    DuckDuckGo,
    /// Brave Search.
    Brave,
    /// Google. In API mode this means the Serper API.
    Google,
    /// Google results through the Serper API.
    GoogleSerper,
    /// Bing.
    Bing,
    /// Baidu.
    Baidu,
    /// Exa (API only).
    Exa,
    /// Travily / Tavily (API only).
    Travily,
    /// Sogou WeChat article search.
    SogouWeixin,
}

impl ProviderKind {
    /// Every provider, in display order.
    pub const ALL: [ProviderKind; 9] = [
        ProviderKind::DuckDuckGo,
        ProviderKind::Brave,
        ProviderKind::Google,
        ProviderKind::GoogleSerper,
        ProviderKind::Bing,
        ProviderKind::Baidu,
        ProviderKind::Exa,
        ProviderKind::Travily,
        ProviderKind::SogouWeixin,
    ];

    /// Canonical configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::DuckDuckGo => "duckduckgo",
            ProviderKind::Brave => "brave",
            ProviderKind::Google => "google",
            ProviderKind::GoogleSerper => "google_serper",
            ProviderKind::Bing => "bing",
            ProviderKind::Baidu => "baidu",
            ProviderKind::Exa => "exa",
            ProviderKind::Travily => "travily",
            ProviderKind::SogouWeixin => "sogou_weixin",
        }
    }

    /// Whether the provider has a scrapeable result page.
    pub fn supports_web(&self) -> bool {
        !matches!(self, ProviderKind::Exa | ProviderKind::Travily)
    }

    /// Whether the provider has a JSON API.
    pub fn supports_api(&self) -> bool {
        matches!(
            self,
            ProviderKind::DuckDuckGo
                | ProviderKind::Brave
                | ProviderKind::Google
                | ProviderKind::GoogleSerper
                | ProviderKind::Exa
                | ProviderKind::Travily
        )
    }

    /// Whether the API needs a key.
    pub fn api_requires_key(&self) -> bool {
        matches!(
            self,
            ProviderKind::Brave
                | ProviderKind::Google
                | ProviderKind::GoogleSerper
                | ProviderKind::Exa
                | ProviderKind::Travily
        )
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(ProviderKind::DuckDuckGo),
            "brave" | "brave_search" | "bravesearch" => Ok(ProviderKind::Brave),
            "google" => Ok(ProviderKind::Google),
            "google_serper" | "googleserper" | "serper" => Ok(ProviderKind::GoogleSerper),
            "bing" => Ok(ProviderKind::Bing),
            "baidu" => Ok(ProviderKind::Baidu),
            "exa" => Ok(ProviderKind::Exa),
            "travily" | "tavily" => Ok(ProviderKind::Travily),
            "sogou_weixin" | "sougou_weixin" | "sogou" => Ok(ProviderKind::SogouWeixin),
            _ => Err(Error::InvalidEngine(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for search backends.
///
/// A provider turns a query into raw results; ranking, deduplication and
/// truncation happen in [`crate::result::finalize`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns which backend this is.
    fn kind(&self) -> ProviderKind;

    /// Performs a search and returns results in provider order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;

    /// Returns the provider name.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Returns false when the provider cannot run (e.g. no API key).
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("duckduckgo".parse::<ProviderKind>().unwrap(), ProviderKind::DuckDuckGo);
        assert_eq!("DuckDuckGo".parse::<ProviderKind>().unwrap(), ProviderKind::DuckDuckGo);
        assert_eq!("BRAVE".parse::<ProviderKind>().unwrap(), ProviderKind::Brave);
        assert_eq!("googleserper".parse::<ProviderKind>().unwrap(), ProviderKind::GoogleSerper);
        assert_eq!("google_serper".parse::<ProviderKind>().unwrap(), ProviderKind::GoogleSerper);
        assert_eq!("tavily".parse::<ProviderKind>().unwrap(), ProviderKind::Travily);
        assert_eq!("travily".parse::<ProviderKind>().unwrap(), ProviderKind::Travily);
        assert_eq!("sogou_weixin".parse::<ProviderKind>().unwrap(), ProviderKind::SogouWeixin);
    }

    #[test]
    fn test_provider_kind_unknown() {
        let err = "altavista".parse::<ProviderKind>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("altavista"));
    }

    #[test]
    fn test_provider_kind_round_trip_names() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn test_provider_capabilities() {
        assert!(!ProviderKind::Exa.supports_web());
        assert!(ProviderKind::Exa.supports_api());
        assert!(!ProviderKind::Bing.supports_api());
        assert!(ProviderKind::GoogleSerper.supports_web());
        assert!(!ProviderKind::DuckDuckGo.api_requires_key());
        assert!(ProviderKind::Travily.api_requires_key());
    }

    #[test]
    fn test_provider_default_methods() {
        struct Fixed;

        #[async_trait]
        impl Provider for Fixed {
            fn kind(&self) -> ProviderKind {
                ProviderKind::Bing
            }

            async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
                Ok(Vec::new())
            }
        }

        assert_eq!(Fixed.name(), "bing");
        assert!(Fixed.is_available());
    }
}
