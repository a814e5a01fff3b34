//! HTTP-based page fetcher using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::{FetcherConfig, DEFAULT_USER_AGENT};
use crate::fetcher::PageFetcher;
use crate::proxy::ProxyConfig;
use crate::{Error, Result};

/// A page fetcher that uses plain HTTP requests via reqwest.
///
/// Suitable for pages that are rendered server-side. For pages that need
/// JavaScript, use `BrowserFetcher` instead.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher with the default user agent and a 30 second timeout.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a fetcher from `[fetcher]` settings and an already resolved proxy.
    pub fn from_config(config: &FetcherConfig, proxy: Option<&str>) -> Result<Self> {
        let mut builder = Self::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout_duration());
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy);
        }
        builder.build()
    }

    /// Like [`HttpFetcher::from_config`], but a proxy that cannot be applied
    /// is dropped instead of failing. The configured user agent and timeout
    /// are kept either way.
    pub fn from_config_or_direct(config: &FetcherConfig, proxy: Option<&str>) -> Self {
        let attempt = match proxy {
            Some(_) => Self::from_config(config, proxy).or_else(|e| {
                warn!("Failed to apply proxy ({}); connecting directly", e);
                Self::from_config(config, None)
            }),
            None => Self::from_config(config, None),
        };
        attempt.unwrap_or_else(|e| {
            warn!("Failed to build HTTP client ({}); using a bare client", e);
            Self {
                client: Client::default(),
                user_agent: config.user_agent.clone(),
                timeout: config.timeout_duration(),
            }
        })
    }

    /// Starts building a fetcher.
    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::default()
    }

    /// Creates an `HttpFetcher` with a custom reqwest client.
    pub fn with_client(client: Client) -> Self {
        let defaults = HttpFetcherBuilder::default();
        Self {
            client,
            user_agent: defaults.user_agent,
            timeout: defaults.timeout,
        }
    }

    /// Returns the underlying client, shared with API providers.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Builder for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherBuilder {
    user_agent: String,
    timeout: Duration,
    proxy: Option<String>,
}

impl Default for HttpFetcherBuilder {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            proxy: None,
        }
    }
}

impl HttpFetcherBuilder {
    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Routes requests through a proxy URL.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Builds the fetcher. Fails on an unusable proxy URL.
    pub fn build(self) -> Result<HttpFetcher> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout);
        if let Some(ref proxy) = self.proxy {
            let proxy: ProxyConfig = proxy.parse()?;
            debug!("HTTP fetcher using proxy {}", proxy);
            builder = builder.proxy(proxy.to_reqwest()?);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(HttpFetcher {
            client,
            user_agent: self.user_agent,
            timeout: self.timeout,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::from_request(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| Error::from_request(e, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_http_fetcher_new() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[test]
    fn test_http_fetcher_with_client() {
        let client = Client::builder().user_agent("test-agent").build().unwrap();
        let _fetcher = HttpFetcher::with_client(client);
    }

    #[test]
    fn test_http_fetcher_invalid_proxy() {
        let err = HttpFetcher::builder().proxy("ftp://nope:21").build().unwrap_err();
        assert!(matches!(err, Error::Proxy(_)));
    }

    #[test]
    fn test_http_fetcher_from_config_with_proxy() {
        let config = FetcherConfig::default();
        assert!(HttpFetcher::from_config(&config, Some("http://127.0.0.1:3128")).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", "TestAgent/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::builder().user_agent("TestAgent/1.0").build().unwrap();
        let body = fetcher.fetch(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch(&format!("{}/missing", server.uri())).await.unwrap_err();
        match err {
            Error::Status { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)), "got {:?}", err);
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_unusable_proxy_falls_back_to_direct_with_settings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .and(header("user-agent", "Configured/2.0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fast"))
            .and(header("user-agent", "Configured/2.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("direct"))
            .mount(&server)
            .await;

        let config = FetcherConfig {
            user_agent: "Configured/2.0".to_string(),
            timeout: 1,
            ..FetcherConfig::default()
        };
        let fetcher = HttpFetcher::from_config_or_direct(&config, Some("ftp://nope:21"));

        let body = fetcher.fetch(&format!("{}/fast", server.uri())).await.unwrap();
        assert_eq!(body, "direct");

        let err = fetcher.fetch(&format!("{}/slow", server.uri())).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_with_client_still_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", DEFAULT_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_client(Client::default());
        assert_eq!(fetcher.fetch(&server.uri()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let fetcher = HttpFetcher::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let err = fetcher.fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(err.is_network());
    }
}
