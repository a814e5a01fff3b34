//! Search provider implementations.
//!
//! Web providers fetch a result page through a [`PageFetcher`] and scrape it;
//! API providers call a JSON endpoint with a reqwest client.

use std::sync::Arc;

use reqwest::Response;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::fetcher::PageFetcher;
use crate::provider::ProviderKind;
use crate::{Error, Result};

// Result page scrapers
mod baidu;
mod bing;
mod brave;
mod duckduckgo;
mod google;
mod sogou_weixin;

// JSON APIs
mod exa;
mod google_serper;
mod travily;

pub use baidu::Baidu;
pub use bing::Bing;
pub use brave::{Brave, BraveApi};
pub use duckduckgo::{DuckDuckGo, DuckDuckGoApi};
pub use google::Google;
pub use sogou_weixin::SogouWeixin;

pub use exa::Exa;
pub use google_serper::GoogleSerper;
pub use travily::Travily;

/// A result page URL template plus the fetcher used to load it.
pub(crate) struct ResultPage {
    fetcher: Arc<dyn PageFetcher>,
    pattern: String,
}

impl ResultPage {
    pub(crate) fn new(fetcher: Arc<dyn PageFetcher>, pattern: &str) -> Self {
        Self {
            fetcher,
            pattern: pattern.to_string(),
        }
    }

    pub(crate) fn set_pattern(&mut self, pattern: impl Into<String>) {
        self.pattern = pattern.into();
    }

    pub(crate) fn url_for(&self, query: &str) -> String {
        query_url(&self.pattern, query)
    }

    pub(crate) async fn load(&self, query: &str) -> Result<String> {
        let url = self.url_for(query);
        debug!("Loading result page {}", url);
        self.fetcher.fetch(&url).await
    }
}

/// Substitutes the URL-encoded query into a `{query}` template.
pub fn query_url(pattern: &str, query: &str) -> String {
    pattern.replace("{query}", &urlencoding::encode(query))
}

/// Resolves `href` against `base`, returning `None` for non-http links.
pub(crate) fn absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let joined = Url::parse(base).ok()?.join(href).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// Returns the configured key or a missing-key error.
pub(crate) fn require_key(kind: ProviderKind, key: &Option<String>) -> Result<&str> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::MissingApiKey(kind.to_string()))
}

/// Checks an API response status and decodes its JSON body.
pub(crate) async fn read_json(kind: ProviderKind, response: Response) -> Result<Value> {
    let status = response.status();
    let url = response.url().to_string();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(Error::Authentication {
            provider: kind.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(Error::Status {
            url,
            status: status.as_u16(),
        });
    }
    let body = response
        .text()
        .await
        .map_err(|e| Error::from_request(e, &url))?;
    serde_json::from_str(&body)
        .map_err(|e| Error::Parse(format!("Invalid {} API response: {}", kind, e)))
}

/// Reads a string field, defaulting to empty.
pub(crate) fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Reads an array field, defaulting to empty.
pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use crate::fetcher::PageFetcher;
    use crate::Result;

    /// Returns fixed HTML and remembers the last URL requested.
    pub(crate) struct FakeFetcher {
        html: String,
        pub(crate) last_url: std::sync::Mutex<Option<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn new(html: &str) -> Self {
            Self {
                html: html.to_string(),
                last_url: std::sync::Mutex::new(None),
            }
        }

        pub(crate) fn last_url(&self) -> Option<String> {
            self.last_url.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            *self.last_url.lock().unwrap() = Some(url.to_string());
            Ok(self.html.clone())
        }
    }
}
