//! Sogou WeChat article search.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;

use super::{absolute_url, ResultPage};
use crate::fetcher::PageFetcher;
use crate::html::{element_text, first_text, selector};
use crate::provider::{Provider, ProviderKind};
use crate::{Result, SearchResult};

/// Result page URL.
pub const WEB_PATTERN: &str =
    "https://weixin.sogou.com/weixin?type=2&s_from=input&ie=utf8&query={query}";

const BASE_URL: &str = "https://weixin.sogou.com/weixin";

/// Sogou WeChat article scraper. Result links are relative redirects, made
/// absolute against `weixin.sogou.com`.
pub struct SogouWeixin {
    page: ResultPage,
}

impl SogouWeixin {
    /// Creates a Sogou WeChat provider loading pages through `fetcher`.
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
        let item_selector = selector("ul.news-list li")?;
        let title_selector = selector("h3 a")?;
        let snippet_selector = selector("p.txt-info")?;

        let mut results = Vec::new();

        for item in document.select(&item_selector) {
            let Some(title_elem) = item.select(&title_selector).next() else {
                continue;
            };
            let title = element_text(&title_elem);
            let url = title_elem
                .value()
                .attr("href")
                .and_then(|href| absolute_url(BASE_URL, href))
                .unwrap_or_default();
            let snippet = first_text(&item, &snippet_selector).unwrap_or_default();

            if !url.is_empty() && !title.is_empty() {
                results.push(SearchResult::new(url, title, snippet));
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl Provider for SogouWeixin {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SogouWeixin
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

    #[test]
    fn test_parse_results() {
        let html = r#"
            <ul class="news-list">
                <li>
                    <div class="txt-box">
                        <h3><a target="_blank" href="/link?url=dn9a_-gY295K0Rci">Rust <em>异步</em>编程</a></h3>
                        <p class="txt-info">深入理解 async/await。</p>
                    </div>
                </li>
                <li><div class="txt-box"><p class="txt-info">no title</p></div></li>
            </ul>
        "#;
        let provider = SogouWeixin::new(Arc::new(FakeFetcher::new("")));
        let results = provider.parse_results(html).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Rust 异步编程");
        assert_eq!(
            results[0].url,
            "https://weixin.sogou.com/link?url=dn9a_-gY295K0Rci"
        );
        assert_eq!(results[0].snippet, "深入理解 async/await。");
    }

    #[tokio::test]
    async fn test_search_builds_url() {
        let fetcher = Arc::new(FakeFetcher::new(""));
        let provider = SogouWeixin::new(fetcher.clone());
        provider.search("rust", 5).await.unwrap();
        assert_eq!(
            fetcher.last_url().as_deref(),
            Some("https://weixin.sogou.com/weixin?type=2&s_from=input&ie=utf8&query=rust")
        );
    }
}
