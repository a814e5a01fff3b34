//! Exa neural search API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{array_field, read_json, require_key, str_field};
use crate::provider::{Provider, ProviderKind};
use crate::{Error, Result, SearchResult};

/// Exa search endpoint.
pub const API_ENDPOINT: &str = "https://api.exa.ai/search";

/// Longest snippet kept from Exa's page text.
const SNIPPET_CHARS: usize = 300;

/// Exa API client. Authenticates with a bearer token.
pub struct Exa {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl Exa {
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
                let text = str_field(item, "text");
                let snippet: String = text.chars().take(SNIPPET_CHARS).collect();
                SearchResult::new(str_field(item, "url"), str_field(item, "title"), snippet)
            })
            .collect()
    }
}

#[async_trait]
impl Provider for Exa {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Exa
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
                "numResults": limit,
                "contents": { "text": { "maxCharacters": SNIPPET_CHARS } }
            }))
            .send()
            .await
            .map_err(|e| Error::from_request(e, "Exa API"))?;
        let data = read_json(self.kind(), response).await?;
        Ok(Self::parse_response(&data))
    }
}
