//! One-call operations over string parameters, for embedding tarzi behind
//! tool or binding layers.
//!
//! Every function parses its mode and format arguments before doing any
//! I/O, builds the components it needs from `config`, and releases browser
//! resources before returning.

use tracing::warn;

use crate::converter::{Converter, Format};
use crate::error::ErrorKind;
use crate::fetcher::{FetchMode, WebFetcher};
use crate::search::{SearchEngine, SearchMode};
use crate::{Config, Result, SearchResult};

/// Searches the web with the configured engine.
pub async fn search_web(
    config: &Config,
    query: &str,
    mode: &str,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let mode: SearchMode = mode.parse()?;
    let engine = SearchEngine::from_config(config);
    let result = engine.search(query, mode, limit).await;
    engine.cleanup().await;
    result
}

/// Fetches a page and converts it. A browser that cannot start falls back
/// to a plain request.
pub async fn fetch_url(config: &Config, url: &str, mode: &str, format: &str) -> Result<String> {
    let mode: FetchMode = mode.parse()?;
    let format: Format = format.parse()?;
    crate::fetcher::validate_url(url)?;

    let fetcher = WebFetcher::from_config(config);
    let mut result = fetcher.fetch(url, mode, format).await;
    if let Err(e) = &result {
        if mode.uses_browser() && e.kind() == ErrorKind::Browser {
            warn!("Browser fetch failed ({}); retrying with {}", e, FetchMode::PlainRequest);
            result = fetcher.fetch(url, FetchMode::PlainRequest, format).await;
        }
    }
    fetcher.cleanup().await;
    result
}

/// Converts HTML into `format`.
pub fn convert_html(html: &str, format: &str) -> Result<String> {
    Converter::new().convert_str(html, format)
}

/// Searches, then fetches every result page.
pub async fn search_and_fetch(
    config: &Config,
    query: &str,
    mode: &str,
    limit: usize,
    fetch_mode: &str,
    format: &str,
) -> Result<Vec<(SearchResult, String)>> {
    let mode: SearchMode = mode.parse()?;
    let fetch_mode: FetchMode = fetch_mode.parse()?;
    let format: Format = format.parse()?;

    let engine = SearchEngine::from_config(config);
    let result = engine
        .search_and_fetch(query, mode, limit, fetch_mode, format)
        .await;
    engine.cleanup().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_web_invalid_mode() {
        let err = search_web(&Config::default(), "rust", "grep", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSearchMode(ref m) if m == "grep"));
    }

    #[tokio::test]
    async fn test_search_web_zero_limit() {
        let results = search_web(&Config::default(), "rust", "webquery", 0)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_url_validates_before_io() {
        let config = Config::default();
        assert!(matches!(
            fetch_url(&config, "https://example.com", "teleport", "html").await,
            Err(Error::InvalidFetchMode(_))
        ));
        assert!(matches!(
            fetch_url(&config, "https://example.com", "plain_request", "pdf").await,
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            fetch_url(&config, "ftp://example.com", "plain_request", "html").await,
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_url_plain_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><head><title>Hi</title></head><body><p>Hello</p></body></html>"),
            )
            .mount(&server)
            .await;

        let json = fetch_url(&Config::default(), &server.uri(), "plain_request", "json")
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "Hi");
        assert!(value["content"].as_str().unwrap().contains("Hello"));
    }

    #[tokio::test]
    async fn test_fetch_url_falls_back_when_browser_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>fallback ok</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let config: Config = "[fetcher]\ntimeout = 5\nweb_driver_url = \"http://127.0.0.1:1\""
            .parse()
            .unwrap();
        let html = fetch_url(&config, &server.uri(), "browser_headless", "html")
            .await
            .unwrap();
        assert_eq!(html, "<p>fallback ok</p>");
    }

    #[test]
    fn test_convert_html() {
        let html = "<h1>Title</h1><p>Body</p>";
        assert_eq!(convert_html(html, "html").unwrap(), html);
        assert!(convert_html(html, "markdown").unwrap().contains("Title"));
        assert!(matches!(
            convert_html(html, "docx"),
            Err(Error::InvalidFormat(ref f)) if f == "docx"
        ));
    }

    #[test]
    fn test_search_and_fetch_invalid_search_mode() {
        let result = tokio_test::block_on(search_and_fetch(
            &Config::default(),
            "q",
            "sideways",
            3,
            "plain",
            "html",
        ));
        let err = tokio_test::assert_err!(result);
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_search_and_fetch_validates_params() {
        let config = Config::default();
        assert!(matches!(
            search_and_fetch(&config, "q", "webquery", 3, "warp", "html").await,
            Err(Error::InvalidFetchMode(_))
        ));
        assert!(matches!(
            search_and_fetch(&config, "q", "webquery", 3, "plain", "rtf").await,
            Err(Error::InvalidFormat(_))
        ));
    }
}
