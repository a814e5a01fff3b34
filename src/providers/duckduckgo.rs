//! DuckDuckGo: server-rendered HTML results and the Instant Answer API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use serde_json::Value;
use url::Url;

use super::{array_field, read_json, str_field, ResultPage};
use crate::fetcher::PageFetcher;
use crate::html::{element_text, first_text, selector};
use crate::provider::{Provider, ProviderKind};
use crate::{Error, Result, SearchResult};

/// HTML endpoint that works without JavaScript.
pub const WEB_PATTERN: &str = "https://html.duckduckgo.com/html/?q={query}";

/// Instant Answer API endpoint.
pub const API_ENDPOINT: &str = "https://api.duckduckgo.com/";

/// DuckDuckGo result page scraper.
pub struct DuckDuckGo {
    page: ResultPage,
}

impl DuckDuckGo {
    /// Creates a DuckDuckGo provider loading pages through `fetcher`.
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
        let result_selector = selector(".result")?;
        let title_selector = selector("a.result__a, .result__title a")?;
        let snippet_selector = selector(".result__snippet")?;

        let mut results = Vec::new();

        for element in document.select(&result_selector) {
            let classes = element.value().attr("class").unwrap_or_default();
            if classes.contains("result--ad") {
                continue;
            }

            let Some(title_elem) = element.select(&title_selector).next() else {
                continue;
            };
            let title = element_text(&title_elem);
            let href = title_elem.value().attr("href").unwrap_or_default();
            let url = extract_redirect_url(href).unwrap_or_else(|| href.to_string());
            let snippet = first_text(&element, &snippet_selector).unwrap_or_default();

            if !url.is_empty() && !title.is_empty() {
                results.push(SearchResult::new(url, title, snippet));
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl Provider for DuckDuckGo {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DuckDuckGo
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        let html = self.page.load(query).await?;
        self.parse_results(&html)
    }
}

/// Unwraps `//duckduckgo.com/l/?uddg=<target>&rut=...` redirect links.
fn extract_redirect_url(href: &str) -> Option<String> {
    if !href.contains("uddg=") {
        return None;
    }
    let absolute = Url::parse("https://duckduckgo.com").ok()?.join(href).ok()?;
    absolute
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
}

/// DuckDuckGo Instant Answer API. Needs no key but only covers topics with
/// an abstract or related links.
pub struct DuckDuckGoApi {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoApi {
    /// Creates an API provider using `client`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: API_ENDPOINT.to_string(),
        }
    }

    /// Overrides the API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn parse_response(data: &Value) -> Vec<SearchResult> {
        let mut results = Vec::new();

        let abstract_url = str_field(data, "AbstractURL");
        if !abstract_url.is_empty() {
            results.push(SearchResult::new(
                abstract_url,
                str_field(data, "Heading"),
                str_field(data, "AbstractText"),
            ));
        }

        for item in array_field(data, "Results") {
            push_topic(item, &mut results);
        }
        for item in array_field(data, "RelatedTopics") {
            let nested = array_field(item, "Topics");
            if nested.is_empty() {
                push_topic(item, &mut results);
            } else {
                nested.iter().for_each(|t| push_topic(t, &mut results));
            }
        }

        results
    }
}

fn push_topic(item: &Value, results: &mut Vec<SearchResult>) {
    let url = str_field(item, "FirstURL");
    let text = str_field(item, "Text");
    if url.is_empty() || text.is_empty() {
        return;
    }
    let title = text.split(" - ").next().unwrap_or(&text).trim().to_string();
    results.push(SearchResult::new(url, title, text));
}

#[async_trait]
impl Provider for DuckDuckGoApi {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DuckDuckGo
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::from_request(e, "DuckDuckGo API"))?;
        let data = read_json(self.kind(), response).await?;
        Ok(Self::parse_response(&data))
    }
}
