//! # tarzi
//!
//! Native web search, page fetching and HTML conversion.
//!
//! - Layered TOML configuration with environment and CLI overrides
//! - Page fetching over plain HTTP or a Chromium browser, optionally proxied
//! - HTML to markdown, JSON or YAML conversion
//! - Search over scraped result pages or provider APIs, with fallback
//!   between providers
//!
//! ## Example
//!
//! ```rust,no_run
//! use tarzi::{Config, FetchMode, Format, SearchEngine, SearchMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config: Config = "[search]\nengine = \"duckduckgo\"".parse()?;
//!     let engine = SearchEngine::from_config(&config);
//!
//!     let results = engine.search("rust programming", SearchMode::WebQuery, 5).await?;
//!     for result in &results {
//!         println!("{}. {}: {}", result.rank, result.title, result.url);
//!     }
//!
//!     let pages = engine
//!         .search_and_fetch("tokio", SearchMode::WebQuery, 3, FetchMode::PlainRequest, Format::Markdown)
//!         .await?;
//!     for (result, content) in pages {
//!         println!("{} ({} bytes)", result.url, content.len());
//!     }
//!
//!     engine.cleanup().await;
//!     Ok(())
//! }
//! ```

mod html;

pub mod autoswitch;
#[cfg(feature = "headless")]
pub mod browser;
pub mod config;
pub mod converter;
pub mod error;
pub mod fetcher;
pub mod fetcher_http;
pub mod provider;
pub mod providers;
pub mod proxy;
pub mod result;
pub mod search;
pub mod tools;

pub use autoswitch::AutoSwitchStrategy;
pub use config::{Config, ConfigLoader, ConfigOverrides};
pub use converter::{Converter, Format};
pub use error::{Error, ErrorKind, Result};
pub use fetcher::{FetchMode, PageFetcher, WebFetcher};
pub use provider::{Provider, ProviderKind};
pub use result::SearchResult;
pub use search::{SearchEngine, SearchMode};
