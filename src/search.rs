//! Search orchestration.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::autoswitch::ProviderChain;
use crate::converter::Format;
use crate::fetcher::{FetchMode, PageFetcher, WebFetcher};
use crate::provider::{Provider, ProviderKind};
use crate::providers::{
    Baidu, Bing, Brave, BraveApi, DuckDuckGo, DuckDuckGoApi, Exa, Google, GoogleSerper,
    SogouWeixin, Travily,
};
use crate::proxy::ProxyConfig;
use crate::result::finalize;
use crate::{Config, Error, Result, SearchResult};

/// How a query reaches a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchMode {
    /// Fetch and scrape the provider's result page.
    #[default]
    WebQuery,
    /// Call the provider's JSON API.
    ApiQuery,
}

impl SearchMode {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::WebQuery => "webquery",
            SearchMode::ApiQuery => "apiquery",
        }
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "webquery" => Ok(SearchMode::WebQuery),
            "apiquery" => Ok(SearchMode::ApiQuery),
            _ => Err(Error::InvalidSearchMode(s.to_string())),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs queries against the configured provider and optionally fetches the
/// pages behind the results.
///
/// Providers are built per call from configuration, so a `SearchEngine` is
/// cheap to share behind an `Arc`. Browser resources live in the inner
/// [`WebFetcher`]; call [`cleanup`](Self::cleanup) when done.
pub struct SearchEngine {
    config: Config,
    fetcher: Arc<WebFetcher>,
    api_client: Client,
    custom: HashMap<(SearchMode, ProviderKind), Arc<dyn Provider>>,
}

impl SearchEngine {
    /// Creates a search engine with default settings.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Creates a search engine from configuration. Enum-like values are
    /// validated when a search runs, not here.
    pub fn from_config(config: &Config) -> Self {
        Self::with_fetcher(config, Arc::new(WebFetcher::from_config(config)))
    }

    /// Creates a search engine that fetches pages through `fetcher`.
    pub fn with_fetcher(config: &Config, fetcher: Arc<WebFetcher>) -> Self {
        let api_client = api_client_or_direct(config, fetcher.proxy()).unwrap_or_else(|e| {
            warn!("Failed to build API client ({}); sharing the page client", e);
            fetcher.http().client().clone()
        });
        Self {
            config: config.clone(),
            fetcher,
            api_client,
            custom: HashMap::new(),
        }
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the page fetcher.
    pub fn fetcher(&self) -> &Arc<WebFetcher> {
        &self.fetcher
    }

    /// Registers `provider` for `mode`, replacing the built-in provider of
    /// the same kind.
    pub fn add_provider(&mut self, mode: SearchMode, provider: Arc<dyn Provider>) {
        debug!("Registering custom {} provider for {}", provider.name(), mode);
        self.custom.insert((mode, provider.kind()), provider);
    }

    /// Searches with the configured engine.
    ///
    /// Results are deduplicated, truncated to `limit` and ranked from 1. A
    /// `limit` of zero returns nothing without touching the network.
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("Query cannot be empty".into()));
        }
        let engine = self.config.search.engine_kind()?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let raw = match mode {
            SearchMode::WebQuery => {
                let provider = self.web_provider(engine)?;
                debug!("Scraping {} for '{}'", provider.name(), query);
                provider.search(query, limit).await?
            }
            SearchMode::ApiQuery => self.api_chain(engine)?.search(query, limit).await?,
        };

        let results = finalize(raw, limit);
        info!(
            "Search '{}' ({} via {}) returned {} results in {}ms",
            query,
            engine,
            mode,
            results.len(),
            start.elapsed().as_millis()
        );
        Ok(results)
    }

    /// Searches with the configured search mode, then fetches every result.
    pub async fn search_with_content(
        &self,
        query: &str,
        limit: usize,
        fetch_mode: FetchMode,
        format: Format,
    ) -> Result<Vec<(SearchResult, String)>> {
        let mode = self.config.search.search_mode()?;
        self.search_and_fetch(query, mode, limit, fetch_mode, format)
            .await
    }

    /// Searches, then fetches and converts every result page concurrently.
    ///
    /// Output order matches search order. A page that cannot be fetched
    /// yields an empty string and a warning instead of failing the batch.
    pub async fn search_and_fetch(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
        fetch_mode: FetchMode,
        format: Format,
    ) -> Result<Vec<(SearchResult, String)>> {
        let results = self.search(query, mode, limit).await?;

        let fetches = results.iter().map(|result| async move {
            match self.fetcher.fetch(&result.url, fetch_mode, format).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", result.url, e);
                    String::new()
                }
            }
        });
        let contents = join_all(fetches).await;

        Ok(results.into_iter().zip(contents).collect())
    }

    /// Releases browser resources. Idempotent.
    pub async fn cleanup(&self) {
        self.fetcher.cleanup().await;
    }

    /// Builds the result page scraper for `kind`.
    fn web_provider(&self, kind: ProviderKind) -> Result<Arc<dyn Provider>> {
        if let Some(provider) = self.custom.get(&(SearchMode::WebQuery, kind)) {
            return Ok(Arc::clone(provider));
        }
        if !kind.supports_web() {
            return Err(unsupported(kind, SearchMode::WebQuery));
        }

        // DuckDuckGo's HTML endpoint renders without JavaScript.
        let pages = match kind {
            ProviderKind::DuckDuckGo => self.fetcher.http() as Arc<dyn PageFetcher>,
            _ => self.fetcher.page_fetcher(self.web_fetch_mode())?,
        };
        let pattern = self.config.search.query_pattern().map(str::to_string);

        let provider: Arc<dyn Provider> = match (kind, pattern) {
            (ProviderKind::DuckDuckGo, Some(p)) => {
                Arc::new(DuckDuckGo::new(pages).with_query_pattern(p))
            }
            (ProviderKind::DuckDuckGo, None) => Arc::new(DuckDuckGo::new(pages)),
            (ProviderKind::Brave, Some(p)) => Arc::new(Brave::new(pages).with_query_pattern(p)),
            (ProviderKind::Brave, None) => Arc::new(Brave::new(pages)),
            (ProviderKind::Google | ProviderKind::GoogleSerper, Some(p)) => {
                Arc::new(Google::new(pages).with_query_pattern(p))
            }
            (ProviderKind::Google | ProviderKind::GoogleSerper, None) => {
                Arc::new(Google::new(pages))
            }
            (ProviderKind::Bing, Some(p)) => Arc::new(Bing::new(pages).with_query_pattern(p)),
            (ProviderKind::Bing, None) => Arc::new(Bing::new(pages)),
            (ProviderKind::Baidu, Some(p)) => Arc::new(Baidu::new(pages).with_query_pattern(p)),
            (ProviderKind::Baidu, None) => Arc::new(Baidu::new(pages)),
            (ProviderKind::SogouWeixin, Some(p)) => {
                Arc::new(SogouWeixin::new(pages).with_query_pattern(p))
            }
            (ProviderKind::SogouWeixin, None) => Arc::new(SogouWeixin::new(pages)),
            (ProviderKind::Exa | ProviderKind::Travily, _) => {
                return Err(unsupported(kind, SearchMode::WebQuery))
            }
        };
        Ok(provider)
    }

    /// Fetch mode for result pages; an invalid configured mode falls back
    /// to headless browsing.
    fn web_fetch_mode(&self) -> FetchMode {
        self.config.fetcher.fetch_mode().unwrap_or_else(|e| {
            warn!("{}; using {}", e, FetchMode::BrowserHeadless);
            FetchMode::BrowserHeadless
        })
    }

    /// Builds the API client for `kind`. `google` is served by Serper.
    fn api_provider(&self, kind: ProviderKind) -> Result<Arc<dyn Provider>> {
        let kind = match kind {
            ProviderKind::Google => ProviderKind::GoogleSerper,
            other => other,
        };
        if let Some(provider) = self.custom.get(&(SearchMode::ApiQuery, kind)) {
            return Ok(Arc::clone(provider));
        }

        let client = self.api_client.clone();
        let key = self.config.search.api_key(kind).map(str::to_string);
        let provider: Arc<dyn Provider> = match kind {
            ProviderKind::DuckDuckGo => Arc::new(DuckDuckGoApi::new(client)),
            ProviderKind::Brave => Arc::new(BraveApi::new(client, key)),
            ProviderKind::GoogleSerper => Arc::new(GoogleSerper::new(client, key)),
            ProviderKind::Exa => Arc::new(Exa::new(client, key)),
            ProviderKind::Travily => Arc::new(Travily::new(client, key)),
            _ => return Err(unsupported(kind, SearchMode::ApiQuery)),
        };
        Ok(provider)
    }

    /// Builds the provider chain for `primary` under the configured policy.
    fn api_chain(&self, primary: ProviderKind) -> Result<ProviderChain> {
        let strategy = self.config.search.autoswitch_strategy();
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

        for kind in strategy.provider_order(primary) {
            let provider = match self.api_provider(kind) {
                Ok(p) => p,
                Err(e) if kind == primary => return Err(e),
                Err(_) => continue,
            };
            if !providers.iter().any(|p| p.kind() == provider.kind()) {
                providers.push(provider);
            }
        }

        let chain = ProviderChain::new(strategy, providers);
        debug!("API provider chain ({}): {:?}", strategy, chain.names());
        Ok(chain)
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn unsupported(kind: ProviderKind, mode: SearchMode) -> Error {
    Error::UnsupportedMode {
        engine: kind.to_string(),
        mode: mode.to_string(),
    }
}

fn build_api_client(config: &Config, proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(&config.fetcher.user_agent)
        .timeout(config.general.timeout_duration());
    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy.parse::<ProxyConfig>()?.to_reqwest()?);
    }
    builder.build().map_err(Error::Http)
}

/// Drops a proxy that cannot be applied rather than losing the configured
/// user agent and timeout.
fn api_client_or_direct(config: &Config, proxy: Option<&str>) -> Result<Client> {
    match proxy {
        Some(_) => build_api_client(config, proxy).or_else(|e| {
            warn!("Failed to apply proxy to API client ({}); connecting directly", e);
            build_api_client(config, None)
        }),
        None => build_api_client(config, None),
    }
}
