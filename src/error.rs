//! Error types for the tarzi library.

use thiserror::Error;

/// Result type alias for tarzi operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`], for callers that handle classes of
/// failure differently (e.g. bad input vs. an unreachable host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid caller input, raised before any I/O.
    Validation,
    /// Unreadable or malformed configuration.
    Config,
    /// DNS, connection, timeout, proxy or HTTP status failures.
    Network,
    /// Search provider rejected or could not serve the request.
    Provider,
    /// Content could not be converted or parsed.
    Conversion,
    /// Browser automation failures.
    Browser,
}

/// Errors that can occur while configuring, fetching, converting or searching.
#[derive(Error, Debug)]
pub enum Error {
    /// Output format outside the recognised set.
    #[error("Invalid format: '{0}' (expected one of: html, markdown, json, yaml)")]
    InvalidFormat(String),

    /// Fetch mode outside the recognised set.
    #[error(
        "Invalid fetch mode: '{0}' (expected one of: plain_request, browser_headless, browser_head, head, browser)"
    )]
    InvalidFetchMode(String),

    /// Search mode outside the recognised set.
    #[error("Invalid search mode: '{0}' (expected one of: webquery, apiquery)")]
    InvalidSearchMode(String),

    /// Unknown search engine name.
    #[error("Unknown search engine: '{0}'")]
    InvalidEngine(String),

    /// URL that cannot be fetched.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The engine has no implementation for the requested mode.
    #[error("Search engine '{engine}' does not support {mode} mode")]
    UnsupportedMode {
        /// Engine name.
        engine: String,
        /// Mode name.
        mode: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration text is not valid TOML.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status} returned by {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Operation timeout exceeded.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Proxy URL could not be used.
    #[error("Invalid proxy '{0}'")]
    Proxy(String),

    /// A provider needs an API key that is not configured.
    #[error("No API key configured for {0}")]
    MissingApiKey(String),

    /// A provider rejected the configured credentials.
    #[error("Authentication failed for {provider} (HTTP {status})")]
    Authentication {
        /// Provider name.
        provider: String,
        /// Response status code.
        status: u16,
    },

    /// Provider returned a page or payload we refuse to parse (e.g. CAPTCHA).
    #[error("{provider} blocked the request: {reason}")]
    Blocked {
        /// Provider name.
        provider: String,
        /// What was detected.
        reason: String,
    },

    /// Every provider in an autoswitch chain failed.
    #[error("All search providers failed: {}", .0.join("; "))]
    ProvidersExhausted(Vec<String>),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Browser automation error.
    #[error("Browser error: {0}")]
    Browser(String),
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidFormat(_)
            | Error::InvalidFetchMode(_)
            | Error::InvalidSearchMode(_)
            | Error::InvalidEngine(_)
            | Error::InvalidUrl { .. }
            | Error::InvalidQuery(_)
            | Error::UnsupportedMode { .. }
            | Error::UrlParse(_) => ErrorKind::Validation,
            Error::Config(_) | Error::ConfigParse(_) | Error::Io(_) => ErrorKind::Config,
            Error::Http(_) | Error::Status { .. } | Error::Timeout(_) | Error::Proxy(_) => {
                ErrorKind::Network
            }
            Error::MissingApiKey(_)
            | Error::Authentication { .. }
            | Error::Blocked { .. }
            | Error::ProvidersExhausted(_) => ErrorKind::Provider,
            Error::Parse(_) | Error::Json(_) | Error::Yaml(_) => ErrorKind::Conversion,
            Error::Browser(_) => ErrorKind::Browser,
        }
    }

    /// Returns true for errors raised on invalid input before any I/O.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Returns true for transport-level failures.
    pub fn is_network(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    /// Maps a reqwest error, surfacing timeouts as [`Error::Timeout`].
    pub(crate) fn from_request(err: reqwest::Error, what: &str) -> Self {
        if err.is_timeout() {
            Error::Timeout(format!("{}: {}", what, err))
        } else {
            Error::Http(err)
        }
    }
}
