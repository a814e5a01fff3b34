//! Search result types.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::converter::Format;
use crate::{Error, Result};

/// A single search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Result description/snippet.
    pub snippet: String,
    /// 1-based position in the final list.
    pub rank: usize,
}

impl SearchResult {
    /// Creates a new search result. The rank is assigned later by [`finalize`].
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            rank: 0,
        }
    }

    /// Sets the rank.
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Returns a normalized URL for deduplication (without scheme and trailing slash).
    pub fn normalized_url(&self) -> String {
        let url = self
            .url
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.")
            .trim_end_matches('/');
        url.to_lowercase()
    }
}

/// Cleans provider output: drops entries without a URL or title, removes
/// duplicate URLs (first wins), truncates to `limit` and ranks from 1.
pub fn finalize(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .map(|mut r| {
            r.title = r.title.trim().to_string();
            r.url = r.url.trim().to_string();
            r.snippet = r.snippet.trim().to_string();
            r
        })
        .filter(|r| !r.url.is_empty() && !r.title.is_empty())
        .filter(|r| seen.insert(r.normalized_url()))
        .take(limit)
        .enumerate()
        .map(|(i, r)| r.with_rank(i + 1))
        .collect()
}

/// Renders results as pretty JSON or YAML.
pub fn render_results(results: &[SearchResult], format: Format) -> Result<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(results)?),
        Format::Yaml => Ok(serde_yaml::to_string(results)?),
        other => Err(Error::InvalidFormat(format!(
            "{} (search results render as json or yaml)",
            other
        ))),
    }
}
