//! Configuration loading and layered resolution.
//!
//! A [`Config`] is an immutable snapshot of resolved settings with three
//! sections:
//!
//! ```toml
//! [general]
//! log_level = "info"
//! timeout = 30
//!
//! [fetcher]
//! mode = "browser_headless"
//! format = "markdown"
//! proxy = "http://127.0.0.1:8080"
//!
//! [search]
//! engine = "duckduckgo"
//! mode = "webquery"
//! limit = 5
//! autoswitch = "smart"
//! brave_api_key = "..."
//! ```
//!
//! Enum-like values (modes, formats, engine names) are kept as written and
//! only validated when a component asks for them through the typed
//! accessors, so a config with an odd value still loads.
//!
//! [`ConfigLoader`] merges several partial layers (CLI overrides, environment,
//! user file, project file) on top of the built-in defaults. Each layer is a
//! TOML table; the first layer that sets a key wins.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use toml::{Table, Value};
use tracing::debug;

use crate::autoswitch::AutoSwitchStrategy;
use crate::converter::Format;
use crate::fetcher::FetchMode;
use crate::provider::ProviderKind;
use crate::proxy::proxy_from_env_with;
use crate::search::SearchMode;
use crate::{Error, Result};

const REDACTED: &str = "***";

/// Default desktop user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// File name of the per-user configuration, resolved against `$HOME`.
pub const USER_CONFIG_FILE: &str = ".tarzi.toml";

/// File name of the project configuration, resolved against the working directory.
pub const PROJECT_CONFIG_FILE: &str = "tarzi.toml";

/// Resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[general]` section.
    pub general: GeneralConfig,
    /// `[fetcher]` section.
    pub fetcher: FetcherConfig,
    /// `[search]` section.
    pub search: SearchConfig,
}

/// `[general]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level used by the CLI when `RUST_LOG` is unset.
    pub log_level: String,
    /// Timeout in seconds for search API calls.
    pub timeout: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            timeout: 30,
        }
    }
}

impl GeneralConfig {
    /// Returns the timeout as a [`Duration`].
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// `[fetcher]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Default fetch mode.
    pub mode: String,
    /// Default output format.
    pub format: String,
    /// Timeout in seconds for a single fetch.
    pub timeout: u64,
    /// User agent for plain requests and browser tabs.
    pub user_agent: String,
    /// Proxy URL; an empty string means no proxy.
    pub proxy: Option<String>,
    /// Browser executable name or path. Legacy driver names
    /// (`chromedriver`, `geckodriver`) select auto-detection.
    pub web_driver: String,
    /// DevTools endpoint of an already running browser.
    pub web_driver_url: Option<String>,
    /// Remote debugging port for launched browsers.
    pub web_driver_port: Option<u16>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            mode: "browser_headless".to_string(),
            format: "markdown".to_string(),
            timeout: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            web_driver: "chromedriver".to_string(),
            web_driver_url: None,
            web_driver_port: None,
        }
    }
}

impl FetcherConfig {
    /// Parses the configured fetch mode.
    pub fn fetch_mode(&self) -> Result<FetchMode> {
        FetchMode::from_str(&self.mode)
    }

    /// Parses the configured output format.
    pub fn output_format(&self) -> Result<Format> {
        Format::from_str(&self.format)
    }

    /// Returns the fetch timeout as a [`Duration`].
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Returns the configured proxy, treating an empty string as unset.
    pub fn proxy_url(&self) -> Option<&str> {
        non_empty(self.proxy.as_deref())
    }
}

/// `[search]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Primary search engine name.
    pub engine: String,
    /// Default search mode.
    pub mode: String,
    /// Default number of results.
    pub limit: usize,
    /// Autoswitch policy name.
    pub autoswitch: String,
    /// Custom result page URL with a `{query}` placeholder.
    pub query_pattern: Option<String>,
    /// Brave Search API key.
    pub brave_api_key: Option<String>,
    /// Serper (Google) API key.
    pub google_serper_api_key: Option<String>,
    /// Exa API key.
    pub exa_api_key: Option<String>,
    /// Travily API key.
    pub travily_api_key: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine: "duckduckgo".to_string(),
            mode: "webquery".to_string(),
            limit: 5,
            autoswitch: "smart".to_string(),
            query_pattern: None,
            brave_api_key: None,
            google_serper_api_key: None,
            exa_api_key: None,
            travily_api_key: None,
        }
    }
}

impl SearchConfig {
    /// Parses the configured search mode.
    pub fn search_mode(&self) -> Result<SearchMode> {
        SearchMode::from_str(&self.mode)
    }

    /// Parses the configured engine name.
    pub fn engine_kind(&self) -> Result<ProviderKind> {
        ProviderKind::from_str(&self.engine)
    }

    /// Returns the autoswitch policy; unknown values mean `smart`.
    pub fn autoswitch_strategy(&self) -> AutoSwitchStrategy {
        AutoSwitchStrategy::from(self.autoswitch.as_str())
    }

    /// Returns the API key configured for a provider, if any.
    pub fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        let key = match kind {
            ProviderKind::Brave => self.brave_api_key.as_deref(),
            ProviderKind::Google | ProviderKind::GoogleSerper => {
                self.google_serper_api_key.as_deref()
            }
            ProviderKind::Exa => self.exa_api_key.as_deref(),
            ProviderKind::Travily => self.travily_api_key.as_deref(),
            _ => None,
        };
        non_empty(key)
    }

    /// Returns the custom result page pattern, if set.
    pub fn query_pattern(&self) -> Option<&str> {
        non_empty(self.query_pattern.as_deref())
    }
}

impl Config {
    /// Creates a configuration with built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        text.parse()
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Returns a copy safe to print or log: API keys and proxy passwords
    /// are masked.
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        let search = &mut config.search;
        for key in [
            &mut search.brave_api_key,
            &mut search.google_serper_api_key,
            &mut search.exa_api_key,
            &mut search.travily_api_key,
        ] {
            if key.as_deref().is_some_and(|k| !k.is_empty()) {
                *key = Some(REDACTED.to_string());
            }
        }
        if let Some(proxy) = config.fetcher.proxy.as_mut() {
            if let Ok(mut parsed) = proxy.parse::<crate::proxy::ProxyConfig>() {
                if parsed.password.is_some() {
                    parsed.password = Some(REDACTED.to_string());
                    *proxy = parsed.url();
                }
            }
        }
        config
    }

    /// Writes the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    fn from_table(table: Table) -> Result<Self> {
        Ok(Value::Table(table).try_into::<Config>()?)
    }
}

impl FromStr for Config {
    type Err = Error;

    /// Parses TOML text. Unknown sections and keys are ignored.
    fn from_str(text: &str) -> Result<Self> {
        Self::from_table(parse_table(text)?)
    }
}

fn parse_table(text: &str) -> Result<Table> {
    Ok(toml::from_str::<Table>(text)?)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Explicit settings from the caller (typically CLI flags). Highest priority.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `general.log_level`
    pub log_level: Option<String>,
    /// `general.timeout` and `fetcher.timeout`
    pub timeout: Option<u64>,
    /// `fetcher.mode`
    pub fetcher_mode: Option<String>,
    /// `fetcher.format`
    pub fetcher_format: Option<String>,
    /// `fetcher.proxy`
    pub proxy: Option<String>,
    /// `search.engine`
    pub search_engine: Option<String>,
    /// `search.mode`
    pub search_mode: Option<String>,
    /// `search.limit`
    pub search_limit: Option<usize>,
    /// `search.autoswitch`
    pub autoswitch: Option<String>,
}

impl ConfigOverrides {
    fn to_table(&self) -> Table {
        let mut table = Table::new();
        set(&mut table, "general", "log_level", self.log_level.clone().map(Value::String));
        let timeout = self.timeout.map(|t| Value::Integer(t as i64));
        set(&mut table, "general", "timeout", timeout.clone());
        set(&mut table, "fetcher", "timeout", timeout);
        set(&mut table, "fetcher", "mode", self.fetcher_mode.clone().map(Value::String));
        set(&mut table, "fetcher", "format", self.fetcher_format.clone().map(Value::String));
        set(&mut table, "fetcher", "proxy", self.proxy.clone().map(Value::String));
        set(&mut table, "search", "engine", self.search_engine.clone().map(Value::String));
        set(&mut table, "search", "mode", self.search_mode.clone().map(Value::String));
        set(
            &mut table,
            "search",
            "limit",
            self.search_limit.map(|l| Value::Integer(l as i64)),
        );
        set(&mut table, "search", "autoswitch", self.autoswitch.clone().map(Value::String));
        table
    }
}

fn set(table: &mut Table, section: &str, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        let entry = table
            .entry(section.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        if let Value::Table(section) = entry {
            section.insert(key.to_string(), value);
        }
    }
}

/// Environment variables mapped to `[search]` API key fields.
const API_KEY_ENV_VARS: &[(&str, &str)] = &[
    ("BRAVE_API_KEY", "brave_api_key"),
    ("GOOGLE_SERPER_API_KEY", "google_serper_api_key"),
    ("EXA_API_KEY", "exa_api_key"),
    ("TRAVILY_API_KEY", "travily_api_key"),
    ("TAVILY_API_KEY", "travily_api_key"),
];

fn env_table<F>(lookup: F) -> Table
where
    F: Fn(&str) -> Option<String>,
{
    let mut table = Table::new();
    set(
        &mut table,
        "fetcher",
        "proxy",
        proxy_from_env_with(&lookup).map(Value::String),
    );
    for (var, field) in API_KEY_ENV_VARS {
        let already_set = table
            .get("search")
            .and_then(|s| s.get(*field))
            .is_some();
        if already_set {
            continue;
        }
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            set(&mut table, "search", field, Some(Value::String(value)));
        }
    }
    table
}

/// Builds a [`Config`] from layers in priority order.
///
/// ```rust,no_run
/// use tarzi::config::{ConfigLoader, ConfigOverrides};
///
/// let config = ConfigLoader::new()
///     .with_overrides(&ConfigOverrides {
///         search_limit: Some(3),
///         ..Default::default()
///     })
///     .with_env()
///     .with_user_file()
///     .with_project_file()
///     .load()?;
/// # Ok::<(), tarzi::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    layers: Vec<(String, Table)>,
    errors: Vec<Error>,
}

impl ConfigLoader {
    /// Creates a loader with no layers (defaults only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard precedence: overrides > environment > `~/.tarzi.toml` >
    /// `./tarzi.toml` > defaults.
    pub fn standard(overrides: &ConfigOverrides) -> Result<Config> {
        Self::new()
            .with_overrides(overrides)
            .with_env()
            .with_user_file()
            .with_project_file()
            .load()
    }

    /// Adds explicit overrides as the next layer.
    pub fn with_overrides(self, overrides: &ConfigOverrides) -> Self {
        self.with_table("overrides", overrides.to_table())
    }

    /// Adds the process environment as the next layer.
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|name| std::env::var(name).ok())
    }

    /// Adds an environment layer read through `lookup`.
    pub fn with_env_lookup<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.with_table("environment", env_table(lookup))
    }

    /// Adds a TOML string as the next layer.
    pub fn with_str(mut self, name: &str, text: &str) -> Self {
        match parse_table(text) {
            Ok(table) => self.with_table(name, table),
            Err(e) => {
                self.errors.push(e);
                self
            }
        }
    }

    /// Adds a TOML file as the next layer. A missing file is skipped; an
    /// unreadable or malformed one fails [`load`](Self::load).
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file {} not found, skipping", path.display());
            return self;
        }
        match std::fs::read_to_string(path) {
            Ok(text) => self.with_str(&path.display().to_string(), &text),
            Err(e) => {
                self.errors.push(Error::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
                self
            }
        }
    }

    /// Adds `~/.tarzi.toml` when `$HOME` is set.
    pub fn with_user_file(self) -> Self {
        match user_config_path() {
            Some(path) => self.with_file(path),
            None => self,
        }
    }

    /// Adds `./tarzi.toml`.
    pub fn with_project_file(self) -> Self {
        self.with_file(PROJECT_CONFIG_FILE)
    }

    fn with_table(mut self, name: &str, table: Table) -> Self {
        self.layers.push((name.to_string(), table));
        self
    }

    /// Merges the layers and resolves the configuration.
    pub fn load(self) -> Result<Config> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        let mut merged = Table::new();
        for (name, layer) in &self.layers {
            debug!("Merging config layer '{}'", name);
            merge_missing(&mut merged, layer);
        }
        Config::from_table(merged)
    }
}

/// Returns `$HOME/.tarzi.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(USER_CONFIG_FILE))
}

/// Copies into `target` every key of `layer` that `target` does not have yet.
fn merge_missing(target: &mut Table, layer: &Table) {
    for (key, value) in layer {
        match (target.get_mut(key), value) {
            (None, _) => {
                target.insert(key.clone(), value.clone());
            }
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_missing(existing, incoming);
            }
            (Some(_), _) => {}
        }
    }
}
