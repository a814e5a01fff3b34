//! Google result page scraping.
//!
//! Google's result page relies on JavaScript rendering, so this provider is
//! normally given a browser-backed [`PageFetcher`].

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;

use super::ResultPage;
use crate::fetcher::PageFetcher;
use crate::html::{first_text, selector};
use crate::provider::{Provider, ProviderKind};
use crate::{Error, Result, SearchResult};

/// Result page URL.
pub const WEB_PATTERN: &str = "https://www.google.com/search?q={query}&hl=en";

/// Google result page scraper.
pub struct Google {
    page: ResultPage,
}

impl Google {
    /// Creates a Google provider loading pages through `fetcher`.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            page: ResultPage::new(fetcher, WEB_PATTERN),
        }
    }

    /// Uses a custom result page URL with a `{query}` placeholder.
    pub fn with_query_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.page.set_pattern(pattern);
        self
    }

    fn parse_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);

        let container_selector = selector("div.g")?;
        let title_selector = selector("h3")?;
        let link_selector = selector("a[href]")?;
        let snippet_selector = selector("div[data-sncf], div.VwiC3b")?;

        let mut results = Vec::new();

        for element in document.select(&container_selector) {
            let Some(title) = first_text(&element, &title_selector) else {
                continue;
            };

            let Some(href) = element
                .select(&link_selector)
                .next()
                .and_then(|el| el.value().attr("href"))
            else {
                continue;
            };
            // Internal links other than /url?q= redirects
            if href.starts_with('/') && !href.starts_with("/url?") {
                continue;
            }
            let url = match href.strip_prefix("/url?q=") {
                Some(q) => {
                    let target = q.split('&').next().unwrap_or(q);
                    urlencoding::decode(target)
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| target.to_string())
                }
                None => href.to_string(),
            };

            let snippet = first_text(&element, &snippet_selector).unwrap_or_default();

            if !url.is_empty() {
                results.push(SearchResult::new(url, title, snippet));
            }
        }

        Ok(results)
    }
}

/// Markers of Google's bot check: the `/sorry/` interstitial and the
/// reCAPTCHA widget frame. Result text that merely mentions reCAPTCHA does
/// not match.
const CHALLENGE_MARKERS: &str = r#"form[action*="/sorry/"], a[href^="/sorry/index"], a[href*="google.com/sorry/index"], #captcha-form, iframe[src*="/recaptcha/"][src*="/anchor"]"#;

fn is_challenge_page(html: &str) -> Result<bool> {
    let markers = selector(CHALLENGE_MARKERS)?;
    Ok(Html::parse_document(html).select(&markers).next().is_some())
}

#[async_trait]
impl Provider for Google {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        let html = self.page.load(query).await?;

        if is_challenge_page(&html)? {
            return Err(Error::Blocked {
                provider: self.name().to_string(),
                reason: "CAPTCHA page returned (bot detected); retry later or use a proxy"
                    .to_string(),
            });
        }

        self.parse_results(&html)
    }
}
