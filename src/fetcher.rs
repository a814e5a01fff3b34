//! Page fetching across plain HTTP and browser modes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, FetcherConfig};
use crate::converter::{Converter, Format};
use crate::fetcher_http::HttpFetcher;
use crate::proxy::effective_proxy;
use crate::{Error, Result};

#[cfg(feature = "headless")]
use crate::browser::{BrowserFetcher, BrowserPool, BrowserPoolConfig};

/// How a page is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FetchMode {
    /// A single HTTP GET; no JavaScript.
    PlainRequest,
    /// Rendered in a browser without a window.
    #[default]
    BrowserHeadless,
    /// Rendered in a visible browser window.
    BrowserHead,
}

impl FetchMode {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::PlainRequest => "plain_request",
            FetchMode::BrowserHeadless => "browser_headless",
            FetchMode::BrowserHead => "browser_head",
        }
    }

    /// Returns true for the modes that need a browser.
    pub fn uses_browser(&self) -> bool {
        !matches!(self, FetchMode::PlainRequest)
    }
}

impl FromStr for FetchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plain_request" | "plain" => Ok(FetchMode::PlainRequest),
            "browser_headless" | "headless" | "browser" => Ok(FetchMode::BrowserHeadless),
            "browser_head" | "head" => Ok(FetchMode::BrowserHead),
            _ => Err(Error::InvalidFetchMode(s.to_string())),
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for fetching the full HTML content of a URL.
///
/// Implementations may use plain HTTP requests or a browser. All settings
/// (user agent, timeout, proxy) are fixed at construction time; `fetch` is a
/// simple URL-in, HTML-out interface.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the HTML content of the given URL.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Checks that `url` parses and uses http or https.
pub fn validate_url(url: &str) -> Result<Url> {
    let invalid = |reason: String| Error::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty URL".to_string()));
    }
    let parsed = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

/// Fetches pages in any [`FetchMode`] and converts them.
///
/// Browsers are started on first use, one per headless/headed flavour, and
/// shared by all calls on this instance. Call [`cleanup`](Self::cleanup) to
/// close them.
pub struct WebFetcher {
    config: FetcherConfig,
    proxy: Option<String>,
    http: Arc<HttpFetcher>,
    converter: Converter,
    #[cfg(feature = "headless")]
    headless: Arc<BrowserPool>,
    #[cfg(feature = "headless")]
    headed: Arc<BrowserPool>,
}

impl WebFetcher {
    /// Creates a fetcher with default settings.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Creates a fetcher from configuration. Never fails: an unusable proxy
    /// is logged and ignored.
    pub fn from_config(config: &Config) -> Self {
        Self::with_proxy(config, effective_proxy(None, &config.fetcher))
    }

    fn with_proxy(config: &Config, proxy: Option<String>) -> Self {
        let proxy = proxy.filter(|p| match p.parse::<crate::proxy::ProxyConfig>() {
            Ok(_) => true,
            Err(e) => {
                warn!("Ignoring proxy: {}", e);
                false
            }
        });
        let fetcher = &config.fetcher;
        let http = HttpFetcher::from_config_or_direct(fetcher, proxy.as_deref());

        Self {
            config: fetcher.clone(),
            http: Arc::new(http),
            converter: Converter::from_config(config),
            #[cfg(feature = "headless")]
            headless: Arc::new(BrowserPool::new(BrowserPoolConfig::from_fetcher_config(
                fetcher,
                true,
                proxy.as_deref(),
            ))),
            #[cfg(feature = "headless")]
            headed: Arc::new(BrowserPool::new(BrowserPoolConfig::from_fetcher_config(
                fetcher,
                false,
                proxy.as_deref(),
            ))),
            proxy,
        }
    }

    /// Returns the `[fetcher]` settings in use.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Returns the resolved proxy, if any.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Returns the converter used for output.
    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Returns the plain HTTP fetcher.
    pub fn http(&self) -> Arc<HttpFetcher> {
        Arc::clone(&self.http)
    }

    /// Returns a [`PageFetcher`] for `mode`, sharing this instance's client
    /// and browsers.
    pub fn page_fetcher(&self, mode: FetchMode) -> Result<Arc<dyn PageFetcher>> {
        match mode {
            FetchMode::PlainRequest => Ok(self.http() as Arc<dyn PageFetcher>),
            #[cfg(feature = "headless")]
            FetchMode::BrowserHeadless => {
                Ok(Arc::new(BrowserFetcher::new(Arc::clone(&self.headless))))
            }
            #[cfg(feature = "headless")]
            FetchMode::BrowserHead => Ok(Arc::new(BrowserFetcher::new(Arc::clone(&self.headed)))),
            #[cfg(not(feature = "headless"))]
            FetchMode::BrowserHeadless | FetchMode::BrowserHead => Err(Error::Browser(format!(
                "fetch mode {} requires the `headless` feature",
                mode
            ))),
        }
    }

    /// Fetches `url` and returns the raw HTML.
    pub async fn fetch_raw(&self, url: &str, mode: FetchMode) -> Result<String> {
        let parsed = validate_url(url)?;
        debug!("Fetching {} ({})", parsed, mode);
        self.page_fetcher(mode)?.fetch(parsed.as_str()).await
    }

    /// Fetches `url` and converts it into `format`.
    pub async fn fetch(&self, url: &str, mode: FetchMode, format: Format) -> Result<String> {
        let html = self.fetch_raw(url, mode).await?;
        self.converter.convert(&html, format)
    }

    /// Fetches `url` with the configured mode and format.
    pub async fn fetch_default(&self, url: &str) -> Result<String> {
        let mode = self.config.fetch_mode()?;
        let html = self.fetch_raw(url, mode).await?;
        self.converter.convert_default(&html)
    }

    /// Fetches through an explicit proxy for this call only. The proxy is
    /// validated before any I/O; browsers started for the call are closed
    /// when it finishes.
    pub async fn fetch_with_proxy(
        &self,
        url: &str,
        proxy: &str,
        mode: FetchMode,
        format: Format,
    ) -> Result<String> {
        validate_url(url)?;
        let proxy: crate::proxy::ProxyConfig = proxy.parse()?;
        let config = Config {
            fetcher: self.config.clone(),
            ..Default::default()
        };
        let scoped = Self::with_proxy(&config, Some(proxy.url()));
        let result = scoped.fetch(url, mode, format).await;
        scoped.cleanup().await;
        result
    }

    /// Closes any browsers this fetcher started. Idempotent; errors are logged.
    pub async fn cleanup(&self) {
        #[cfg(feature = "headless")]
        {
            self.headless.shutdown().await;
            self.headed.shutdown().await;
        }
        debug!("Web fetcher cleaned up");
    }
}

impl Default for WebFetcher {
    fn default() -> Self {
        Self::new()
    }
}
