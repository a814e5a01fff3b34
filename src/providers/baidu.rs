//! Baidu result page scraping.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;

use super::{absolute_url, ResultPage};
use crate::fetcher::PageFetcher;
use crate::html::{element_text, first_text, selector};
use crate::provider::{Provider, ProviderKind};
use crate::{Result, SearchResult};

/// Result page URL.
pub const WEB_PATTERN: &str = "https://www.baidu.com/s?wd={query}";

/// Baidu result page scraper.
pub struct Baidu {
    page: ResultPage,
}

impl Baidu {
    /// Creates a Baidu provider loading pages through `fetcher`.
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
        let result_selector = selector("div.result, div.c-container")?;
        let title_selector = selector("h3 a, .t a")?;
        let snippet_selector = selector(".c-abstract, .c-span-last, .content-right_8Zs40")?;

        let mut results = Vec::new();

        for element in document.select(&result_selector) {
            // Promoted entries
            let is_ad = element.value().attrs().any(|(k, _)| k.contains("data-tuiguang"))
                || element
                    .value()
                    .attr("class")
                    .is_some_and(|c| c.contains("ec_ad") || c.contains("ad-block"));
            if is_ad {
                continue;
            }

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
impl Provider for Baidu {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Baidu
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

    fn make_baidu() -> Baidu {
        Baidu::new(Arc::new(FakeFetcher::new("")))
    }

    #[test]
    fn test_parse_results() {
        let html = r#"
            <div id="content_left">
                <div class="result c-container">
                    <h3><a href="https://www.rust-lang.org/">Rust 编程语言</a></h3>
                    <div class="c-abstract">一门赋予每个人构建可靠软件能力的语言。</div>
                </div>
                <div class="result c-container" data-tuiguang="1">
                    <h3><a href="https://ads.example.com">推广</a></h3>
                </div>
                <div class="c-container">
                    <h3><a href="/link?url=abc">Rust 程序设计语言</a></h3>
                </div>
            </div>
        "#;
        let results = make_baidu().parse_results(html).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust 编程语言");
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert_eq!(results[0].snippet, "一门赋予每个人构建可靠软件能力的语言。");
        assert_eq!(results[1].url, "https://www.baidu.com/link?url=abc");
    }

    #[test]
    fn test_parse_results_empty_html() {
        assert!(make_baidu().parse_results("<html></html>").unwrap().is_empty());
    }
}
