//! Travily (Tavily) search API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{array_field, read_json, require_key, str_field};
use crate::provider::{Provider, ProviderKind};
use crate::{Error, Result, SearchResult};

/// Tavily search endpoint.
pub const API_ENDPOINT: &str = "https://api.tavily.com/search";

/// Tavily API client. Authenticates with a bearer token.
pub struct Travily {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl Travily {
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
        array_field(data, "results")
            .iter()
            .map(|item| {
                SearchResult::new(
                    str_field(item, "url"),
                    str_field(item, "title"),
                    str_field(item, "content"),
                )
            })
            .collect()
    }
}

#[async_trait]
impl Provider for Travily {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Travily
    }

    fn is_available(&self) -> bool {
        require_key(self.kind(), &self.api_key).is_ok()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let key = require_key(self.kind(), &self.api_key)?;
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&json!({
                "query": query,
                "max_results": limit,
                "search_depth": "basic",
                "include_answer": false,
                "include_raw_content": false
            }))
            .send()
            .await
            .map_err(|e| Error::from_request(e, "Travily API"))?;
        let data = read_json(self.kind(), response).await?;
        Ok(Self::parse_response(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer tvly-key"))
            .and(body_partial_json(json!({"query": "rust", "max_results": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "rust",
                "results": [
                    {"title": "Rust", "url": "https://www.rust-lang.org", "content": "Lang", "score": 0.9}
                ]
            })))
            .mount(&server)
            .await;

        let provider =
            Travily::new(Client::new(), Some("tvly-key".into())).with_endpoint(server.uri());
        let results = provider.search("rust", 4).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].snippet, "Lang");
    }

    #[tokio::test]
    async fn test_search_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = Travily::new(Client::new(), Some("k".into())).with_endpoint(server.uri());
        let err = provider.search("rust", 4).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 429, .. }));
    }
}
