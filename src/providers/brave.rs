//! Brave Search: result page scraping and the Web Search API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use serde_json::Value;

use super::{array_field, read_json, require_key, str_field, ResultPage};
use crate::fetcher::PageFetcher;
use crate::html::{first_text, selector};
use crate::provider::{Provider, ProviderKind};
use crate::{Error, Result, SearchResult};

/// Result page URL.
pub const WEB_PATTERN: &str = "https://search.brave.com/search?q={query}&source=web";

/// Web Search API endpoint.
pub const API_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave result page scraper.
pub struct Brave {
    page: ResultPage,
}

impl Brave {
    /// Creates a Brave provider loading pages through `fetcher`.
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

        let result_selector = selector(r#"div.snippet[data-type="web"]"#)?;
        let title_selector = selector(".search-snippet-title, .title")?;
        let desc_selector = selector(".generic-snippet .content, .snippet-description")?;
        let url_selector = selector(r#"a[href^="http"]"#)?;

        let results = document
            .select(&result_selector)
            .filter_map(|element| {
                let title = first_text(&element, &title_selector)?;
                let url = element
                    .select(&url_selector)
                    .next()
                    .and_then(|e| e.value().attr("href"))?
                    .to_string();
                let snippet = first_text(&element, &desc_selector).unwrap_or_default();
                Some(SearchResult::new(url, title, snippet))
            })
            .collect();

        Ok(results)
    }
}

#[async_trait]
impl Provider for Brave {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Brave
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        let html = self.page.load(query).await?;
        self.parse_results(&html)
    }
}

/// Brave Web Search API client. Authenticates with `X-Subscription-Token`.
pub struct BraveApi {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl BraveApi {
    /// Creates an API provider; without a key it reports unavailable.
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            endpoint: API_ENDPOINT.to_string(),
        }
    }

    /// Overrides the API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn parse_response(data: &Value) -> Vec<SearchResult> {
        let web = data.get("web").unwrap_or(&Value::Null);
        array_field(web, "results")
            .iter()
            .map(|item| {
                SearchResult::new(
                    str_field(item, "url"),
                    str_field(item, "title"),
                    str_field(item, "description"),
                )
            })
            .collect()
    }
}

#[async_trait]
impl Provider for BraveApi {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Brave
    }

    fn is_available(&self) -> bool {
        require_key(self.kind(), &self.api_key).is_ok()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let key = require_key(self.kind(), &self.api_key)?;
        // The API caps count at 20.
        let count = limit.clamp(1, 20).to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await
            .map_err(|e| Error::from_request(e, "Brave API"))?;
        let data = read_json(self.kind(), response).await?;
        Ok(Self::parse_response(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::FakeFetcher;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_brave(html: &str) -> Brave {
        Brave::new(Arc::new(FakeFetcher::new(html)))
    }

    #[test]
    fn test_parse_results() {
        let html = r#"
            <div class="snippet" data-type="web">
                <a href="https://www.rust-lang.org/"><div class="title search-snippet-title">Rust Programming Language</div></a>
                <div class="snippet-description">Fast, reliable, productive.</div>
            </div>
            <div class="snippet" data-type="video">
                <a href="https://example.com/video"><div class="search-snippet-title">A Video</div></a>
            </div>
            <div class="snippet" data-type="web">
                <a href="/relative"><div class="search-snippet-title">Internal</div></a>
            </div>
        "#;
        let results = make_brave("").parse_results(html).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert_eq!(results[0].snippet, "Fast, reliable, productive.");
    }

    #[test]
    fn test_parse_results_empty() {
        assert!(make_brave("").parse_results("<html></html>").unwrap().is_empty());
    }

    #[test]
    fn test_api_parse_response() {
        let data = json!({
            "web": {"results": [
                {"title": "Rust", "url": "https://www.rust-lang.org", "description": "Lang"},
                {"title": "Crates", "url": "https://crates.io", "description": "Registry"}
            ]}
        });
        let results = BraveApi::parse_response(&data);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].snippet, "Registry");
        assert!(BraveApi::parse_response(&json!({})).is_empty());
    }

    #[test]
    fn test_api_availability() {
        assert!(!BraveApi::new(Client::new(), None).is_available());
        assert!(BraveApi::new(Client::new(), Some("key".into())).is_available());
    }

    #[tokio::test]
    async fn test_api_search_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/res/v1/web/search"))
            .and(header("X-Subscription-Token", "secret"))
            .and(query_param("q", "rust"))
            .and(query_param("count", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "web": {"results": [{"title": "Rust", "url": "https://www.rust-lang.org", "description": "d"}]}
            })))
            .mount(&server)
            .await;

        let provider = BraveApi::new(Client::new(), Some("secret".into()))
            .with_endpoint(format!("{}/res/v1/web/search", server.uri()));
        let results = provider.search("rust", 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://www.rust-lang.org");
    }

    #[tokio::test]
    async fn test_api_search_missing_key() {
        let provider = BraveApi::new(Client::new(), None);
        let err = provider.search("rust", 3).await.unwrap_err();
        assert!(matches!(err, Error::MissingApiKey(_)));
    }

    #[tokio::test]
    async fn test_api_search_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = BraveApi::new(Client::new(), Some("bad".into())).with_endpoint(server.uri());
        let err = provider.search("rust", 3).await.unwrap_err();
        assert!(matches!(err, Error::Authentication { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_api_search_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = BraveApi::new(Client::new(), Some("k".into())).with_endpoint(server.uri());
        let err = provider.search("rust", 3).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 500, .. }));
    }
}
