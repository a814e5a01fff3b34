//! Proxy parsing and resolution.
//!
//! A proxy can come from three places. An explicit per-call argument wins,
//! then the `HTTPS_PROXY` / `HTTP_PROXY` environment variables, then
//! `fetcher.proxy` from the configuration. Empty strings count as unset.

use std::fmt;
use std::str::FromStr;

use reqwest::Proxy as ReqwestProxy;
use url::Url;

use crate::config::FetcherConfig;
use crate::{Error, Result};

/// Environment variables consulted for a proxy, in priority order.
pub const PROXY_ENV_VARS: &[&str] = &["HTTPS_PROXY", "HTTP_PROXY", "https_proxy", "http_proxy"];

/// Proxy protocol type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyProtocol {
    /// HTTP proxy
    #[default]
    Http,
    /// HTTPS proxy
    Https,
    /// SOCKS5 proxy, names resolved locally
    Socks5,
    /// SOCKS5 proxy, names resolved by the proxy
    Socks5h,
}

impl ProxyProtocol {
    fn scheme(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks5 => "socks5",
            ProxyProtocol::Socks5h => "socks5h",
        }
    }
}

/// A parsed proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host (IP or domain)
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Proxy protocol
    pub protocol: ProxyProtocol,
    /// Optional username for authentication
    pub username: Option<String>,
    /// Optional password for authentication
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Creates an HTTP proxy configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: ProxyProtocol::Http,
            username: None,
            password: None,
        }
    }

    /// Sets the proxy protocol.
    pub fn with_protocol(mut self, protocol: ProxyProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets authentication credentials.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Returns the proxy URL string. Credentials are percent-encoded.
    pub fn url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!(
                "{}://{}:{}@{}:{}",
                self.protocol.scheme(),
                urlencoding::encode(user),
                urlencoding::encode(pass),
                self.host,
                self.port
            ),
            _ => format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port),
        }
    }

    /// Returns the proxy URL without credentials, for logging and
    /// browser `--proxy-server` arguments.
    pub fn server(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }

    /// Returns the `--proxy-server` value for Chromium, which has no
    /// `socks5h` scheme and always resolves names through a SOCKS proxy.
    pub fn browser_server(&self) -> String {
        let scheme = match self.protocol {
            ProxyProtocol::Socks5h => "socks5",
            other => other.scheme(),
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Builds a reqwest proxy applied to all schemes.
    pub fn to_reqwest(&self) -> Result<ReqwestProxy> {
        ReqwestProxy::all(self.url()).map_err(|e| Error::Proxy(format!("{}: {}", self.server(), e)))
    }
}

impl FromStr for ProxyConfig {
    type Err = Error;

    /// Parses `scheme://[user:pass@]host:port`. A missing scheme means HTTP;
    /// a missing port uses the scheme default (80, 443, 1080).
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::Proxy("empty proxy URL".to_string()));
        }
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
        let parsed = Url::parse(&with_scheme).map_err(|e| Error::Proxy(format!("{}: {}", s, e)))?;

        let protocol = match parsed.scheme() {
            "http" => ProxyProtocol::Http,
            "https" => ProxyProtocol::Https,
            "socks5" => ProxyProtocol::Socks5,
            "socks5h" => ProxyProtocol::Socks5h,
            other => {
                return Err(Error::Proxy(format!(
                    "{}: unsupported scheme '{}' (expected http, https, socks5 or socks5h)",
                    s, other
                )))
            }
        };
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Proxy(format!("{}: missing host", s)))?
            .to_string();
        let port = parsed.port().unwrap_or(match protocol {
            ProxyProtocol::Http => 80,
            ProxyProtocol::Https => 443,
            ProxyProtocol::Socks5 | ProxyProtocol::Socks5h => 1080,
        });

        let mut config = ProxyConfig::new(host, port).with_protocol(protocol);
        if !parsed.username().is_empty() {
            let password = parsed.password().unwrap_or_default();
            config = config.with_auth(decode(parsed.username()), decode(password));
        }
        Ok(config)
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.server())
    }
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Returns the first non-empty proxy from [`PROXY_ENV_VARS`], read through `lookup`.
pub fn proxy_from_env_with<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    PROXY_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Returns the proxy configured in the process environment.
pub fn proxy_from_env() -> Option<String> {
    proxy_from_env_with(|name| std::env::var(name).ok())
}

/// Resolves the proxy for a request: explicit argument, then environment,
/// then `fetcher.proxy`.
pub fn effective_proxy(explicit: Option<&str>, config: &FetcherConfig) -> Option<String> {
    effective_proxy_with(explicit, config, |name| std::env::var(name).ok())
}

/// [`effective_proxy`] with a custom environment lookup.
pub fn effective_proxy_with<F>(
    explicit: Option<&str>,
    config: &FetcherConfig,
    lookup: F,
) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .or_else(|| proxy_from_env_with(lookup))
        .or_else(|| config.proxy_url().map(str::to_string))
}
