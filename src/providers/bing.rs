//! Bing result page scraping.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;

use super::{absolute_url, ResultPage};
use crate::fetcher::PageFetcher;
use crate::html::{element_text, first_text, selector};
use crate::provider::{Provider, ProviderKind};
use crate::{Result, SearchResult};

/// Result page URL.
pub const WEB_PATTERN: &str = "https://www.bing.com/search?q={query}";

/// Bing result page scraper.
pub struct Bing {
    page: ResultPage,
}

impl Bing {
    /// Creates a Bing provider loading pages through `fetcher`.
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
        let result_selector = selector("li.b_algo")?;
        let title_selector = selector("h2 a")?;
        let snippet_selector = selector(".b_caption p, .b_algoSlug, .b_lineclamp2")?;

        let mut results = Vec::new();

        for element in document.select(&result_selector) {
            let Some(title_elem) = element.select(&title_selector).next() else {
                continue;
            };
            let title = element_text(&title_elem);
            let url = title_elem
                .value()
                .attr("href")
                .and_then(|href| absolute_url(WEB_PATTERN, href))
                .unwrap_or_default();
            let snippet = first_text(&element, &snippet_selector).unwrap_or_default();

            if !url.is_empty() && !title.is_empty() {
                results.push(SearchResult::new(url, title, snippet));
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl Provider for Bing {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bing
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        let html = self.page.load(query).await?;
        self.parse_results(&html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::FakeFetcher;

    fn make_bing(html: &str) -> Bing {
        Bing::new(Arc::new(FakeFetcher::new(html)))
    }

    #[test]
    fn test_parse_results() {
        let html = r#"
            <ol id="b_results">
                <li class="b_algo">
                    <h2><a href="https://www.rust-lang.org/">Rust Programming Language</a></h2>
                    <div class="b_caption"><p>A language empowering everyone.</p></div>
                </li>
                <li class="b_algo">
                    <h2><a href="https://crates.io/">crates.io</a></h2>
                    <p class="b_algoSlug">The Rust community's crate registry</p>
                </li>
                <li class="b_ad"><h2><a href="https://ads.example.com">Ad</a></h2></li>
                <li class="b_algo"><div>no heading</div></li>
            </ol>
        "#;
        let results = make_bing("").parse_results(html).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].snippet, "A language empowering everyone.");
        assert_eq!(results[1].url, "https://crates.io/");
        assert_eq!(results[1].snippet, "The Rust community's crate registry");
    }

    #[test]
    fn test_parse_results_empty_html() {
        assert!(make_bing("").parse_results("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_builds_url() {
        let fetcher = Arc::new(FakeFetcher::new("<html></html>"));
        let provider = Bing::new(fetcher.clone());
        assert!(provider.search("rust async", 5).await.unwrap().is_empty());
        assert_eq!(
            fetcher.last_url().as_deref(),
            Some("https://www.bing.com/search?q=rust%20async")
        );
    }
}
