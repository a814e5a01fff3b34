//! Google results through the Serper API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{array_field, read_json, require_key, str_field};
use crate::provider::{Provider, ProviderKind};
use crate::{Error, Result, SearchResult};

/// Serper search endpoint.
pub const API_ENDPOINT: &str = "https://google.serper.dev/search";

/// Serper API client. Authenticates with `X-API-KEY`.
pub struct GoogleSerper {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl GoogleSerper {
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
        array_field(data, "organic")
            .iter()
            .map(|item| {
                SearchResult::new(
                    str_field(item, "link"),
                    str_field(item, "title"),
                    str_field(item, "snippet"),
                )
            })
            .collect()
    }
}

#[async_trait]
impl Provider for GoogleSerper {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleSerper
    }

    fn is_available(&self) -> bool {
        require_key(self.kind(), &self.api_key).is_ok()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let key = require_key(self.kind(), &self.api_key)?;
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", key)
            .json(&json!({ "q": query, "num": limit }))
            .send()
            .await
            .map_err(|e| Error::from_request(e, "Serper API"))?;
        let data = read_json(self.kind(), response).await?;
        Ok(Self::parse_response(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-API-KEY", "serper-key"))
            .and(body_json(json!({"q": "rust", "num": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    {"title": "Rust", "link": "https://www.rust-lang.org", "snippet": "Lang", "position": 1},
                    {"title": "Book", "link": "https://doc.rust-lang.org/book", "snippet": "Docs", "position": 2}
                ]
            })))
            .mount(&server)
            .await;

        let provider =
            GoogleSerper::new(Client::new(), Some("serper-key".into())).with_endpoint(server.uri());
        let results = provider.search("rust", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.rust-lang.org");
        assert_eq!(results[1].snippet, "Docs");
    }

    #[tokio::test]
    async fn test_search_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let provider = GoogleSerper::new(Client::new(), Some("k".into())).with_endpoint(server.uri());
        let err = provider.search("rust", 2).await.unwrap_err();
        assert!(matches!(err, Error::Authentication { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_search_missing_key() {
        let provider = GoogleSerper::new(Client::new(), None);
        assert!(!provider.is_available());
        assert!(matches!(
            provider.search("rust", 2).await,
            Err(Error::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_parse_response_without_organic() {
        assert!(GoogleSerper::parse_response(&json!({"knowledgeGraph": {}})).is_empty());
    }
}
