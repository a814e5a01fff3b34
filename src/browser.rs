//! Chromium automation for the browser fetch modes.
//!
//! This module is only available when the `headless` Cargo feature is enabled.
//! A [`BrowserPool`] owns one browser process (launched lazily, or attached to
//! an already running instance through its DevTools endpoint) and bounds the
//! number of concurrently open tabs. [`BrowserFetcher`] renders a page in a
//! fresh tab and returns the resulting HTML.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use futures::StreamExt;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::config::{FetcherConfig, DEFAULT_USER_AGENT};
use crate::fetcher::PageFetcher;
use crate::proxy::ProxyConfig;
use crate::{Error, Result};

/// Driver names from WebDriver-based setups. They do not name a browser, so
/// they select auto-detection.
const LEGACY_DRIVERS: &[&str] = &["chromedriver", "geckodriver", "msedgedriver", "safaridriver"];

#[cfg(target_os = "macos")]
const KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(all(unix, not(target_os = "macos")))]
const KNOWN_PATHS: &[&str] = &[
    "/opt/google/chrome/chrome",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

#[cfg(windows)]
const KNOWN_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

const KNOWN_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Finds an installed Chrome/Chromium: `$CHROME`, then `PATH`, then
/// well-known install locations.
pub fn detect_chrome() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROME") {
        let p = PathBuf::from(&path);
        if p.exists() {
            debug!("Chrome found via CHROME env var: {}", path);
            return Some(p);
        }
    }

    for cmd in KNOWN_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            debug!("Chrome found in PATH: {}", path.display());
            return Some(path);
        }
    }

    KNOWN_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

/// Returns true for WebDriver binary names that should not be launched.
pub fn is_legacy_driver(name: &str) -> bool {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    LEGACY_DRIVERS.contains(&stem.to_lowercase().as_str())
}

/// Resolves `fetcher.web_driver` to a browser executable.
pub fn resolve_executable(web_driver: &str) -> Option<PathBuf> {
    let web_driver = web_driver.trim();
    if web_driver.is_empty() || is_legacy_driver(web_driver) {
        return detect_chrome();
    }
    let path = Path::new(web_driver);
    if path.exists() {
        return Some(path.to_path_buf());
    }
    match which::which(web_driver) {
        Ok(path) => Some(path),
        Err(_) => {
            warn!("Browser '{}' not found, falling back to auto-detection", web_driver);
            detect_chrome()
        }
    }
}

/// Configuration for the browser pool.
#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    /// Maximum number of concurrent browser tabs.
    pub max_tabs: usize,
    /// Whether to run the browser without a window.
    pub headless: bool,
    /// Browser executable name or path (`fetcher.web_driver`).
    pub web_driver: String,
    /// DevTools endpoint of a running browser; skips launching when set.
    pub remote_url: Option<String>,
    /// Remote debugging port for a launched browser.
    pub port: Option<u16>,
    /// Proxy URL for the browser to use.
    pub proxy_url: Option<String>,
    /// User agent applied to every tab.
    pub user_agent: String,
    /// Upper bound for one page load, including waiting for a free tab.
    pub timeout: Duration,
    /// Additional launch arguments.
    pub launch_args: Vec<String>,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            max_tabs: 4,
            headless: true,
            web_driver: "chromedriver".to_string(),
            remote_url: None,
            port: None,
            proxy_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            launch_args: Vec::new(),
        }
    }
}

impl BrowserPoolConfig {
    /// Derives pool settings from `[fetcher]`.
    pub fn from_fetcher_config(config: &FetcherConfig, headless: bool, proxy: Option<&str>) -> Self {
        Self {
            headless,
            web_driver: config.web_driver.clone(),
            remote_url: config
                .web_driver_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            port: config.web_driver_port,
            proxy_url: proxy.map(str::to_string),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout_duration(),
            ..Default::default()
        }
    }
}

struct PooledBrowser {
    browser: Arc<Browser>,
    /// Attached through `remote_url`; never closed by us.
    attached: bool,
}

/// A shared pool managing a single browser process with tab concurrency control.
///
/// The browser is started on the first [`acquire_browser`](Self::acquire_browser)
/// call. The async mutex serialises startup; the semaphore limits open tabs.
pub struct BrowserPool {
    config: BrowserPoolConfig,
    browser: Mutex<Option<PooledBrowser>>,
    tab_semaphore: Arc<Semaphore>,
}

impl BrowserPool {
    /// Creates a new browser pool with the given configuration.
    pub fn new(config: BrowserPoolConfig) -> Self {
        let max_tabs = config.max_tabs.max(1);
        Self {
            config,
            browser: Mutex::new(None),
            tab_semaphore: Arc::new(Semaphore::new(max_tabs)),
        }
    }

    /// Returns the pool configuration.
    pub fn config(&self) -> &BrowserPoolConfig {
        &self.config
    }

    /// Returns the tab semaphore for acquiring permits before opening tabs.
    pub fn tab_semaphore(&self) -> &Arc<Semaphore> {
        &self.tab_semaphore
    }

    /// Returns true once a browser has been started or attached.
    pub async fn is_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// Starts or attaches the browser on first use and returns a shared handle.
    pub async fn acquire_browser(&self) -> Result<Arc<Browser>> {
        let mut guard = self.browser.lock().await;

        if let Some(ref pooled) = *guard {
            return Ok(Arc::clone(&pooled.browser));
        }

        let (browser, mut handler, attached) = match self.config.remote_url {
            Some(ref url) => {
                info!("Connecting to browser at {}", url);
                let (browser, handler) = Browser::connect(url.clone())
                    .await
                    .map_err(|e| Error::Browser(format!("Failed to connect to {}: {}", url, e)))?;
                (browser, handler, true)
            }
            None => {
                let browser_config = self.launch_config()?;
                info!(
                    "Launching {} browser",
                    if self.config.headless { "headless" } else { "headed" }
                );
                let (browser, handler) = Browser::launch(browser_config)
                    .await
                    .map_err(|e| Error::Browser(format!("Failed to launch browser: {}", e)))?;
                (browser, handler, false)
            }
        };

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser CDP handler error: {}", e);
                }
            }
            debug!("Browser CDP handler exited");
        });

        let browser = Arc::new(browser);
        *guard = Some(PooledBrowser {
            browser: Arc::clone(&browser),
            attached,
        });

        Ok(browser)
    }

    fn launch_config(&self) -> Result<BrowserConfig> {
        let executable = resolve_executable(&self.config.web_driver).ok_or_else(|| {
            Error::Browser(
                "No Chrome/Chromium executable found; set fetcher.web_driver or CHROME".to_string(),
            )
        })?;
        debug!("Using browser at {}", executable.display());

        let mut builder = BrowserConfig::builder().chrome_executable(executable);

        if self.config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        if let Some(port) = self.config.port {
            builder = builder.port(port);
        }

        builder = builder
            .arg(format!("--user-agent={}", self.config.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg("--mute-audio");

        if let Some(ref proxy) = self.config.proxy_url {
            let proxy: ProxyConfig = proxy.parse()?;
            builder = builder.arg(format!("--proxy-server={}", proxy.browser_server()));
        }

        for arg in &self.config.launch_args {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| Error::Browser(format!("Failed to build browser config: {}", e)))
    }

    /// Closes a launched browser, or detaches from an attached one.
    /// Safe to call repeatedly; failures are logged.
    pub async fn shutdown(&self) {
        let Some(pooled) = self.browser.lock().await.take() else {
            return;
        };
        if pooled.attached {
            debug!("Detached from remote browser");
            return;
        }
        match Arc::try_unwrap(pooled.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser: {}", e);
                }
                if let Err(e) = browser.wait().await {
                    warn!("Failed to wait for browser exit: {}", e);
                }
                info!("Browser closed");
            }
            Err(_) => warn!("Browser still in use during shutdown; dropping handle"),
        }
    }
}

/// A [`PageFetcher`] that renders pages in a browser tab.
pub struct BrowserFetcher {
    pool: Arc<BrowserPool>,
}

impl BrowserFetcher {
    /// Creates a fetcher backed by `pool`.
    pub fn new(pool: Arc<BrowserPool>) -> Self {
        Self { pool }
    }

    async fn render(&self, url: &str) -> Result<String> {
        let _permit = self
            .pool
            .tab_semaphore()
            .acquire()
            .await
            .map_err(|e| Error::Browser(format!("Tab semaphore closed: {}", e)))?;

        let browser = self.pool.acquire_browser().await?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Browser(format!("Failed to open tab: {}", e)))?;

        let timeout = self.pool.config().timeout;
        let loaded = async {
            page.set_user_agent(SetUserAgentOverrideParams::new(
                self.pool.config().user_agent.clone(),
            ))
            .await
            .map_err(|e| Error::Browser(format!("Failed to set user agent: {}", e)))?;
            within(timeout, url, async {
                page.goto(url)
                    .await
                    .map_err(|e| Error::Browser(format!("Navigation to {} failed: {}", url, e)))?;
                page.wait_for_navigation()
                    .await
                    .map_err(|e| Error::Browser(format!("Navigation wait failed: {}", e)))?;
                page.content()
                    .await
                    .map_err(|e| Error::Browser(format!("Failed to get page content: {}", e)))
            })
            .await
        }
        .await;

        // The tab is closed on every path, including an elapsed navigation.
        if let Err(e) = page.close().await {
            warn!("Failed to close browser tab: {}", e);
        }

        loaded
    }
}

/// Bounds page navigation and content extraction by the fetch timeout.
async fn within<F>(timeout: Duration, url: &str, load: F) -> Result<String>
where
    F: std::future::Future<Output = Result<String>>,
{
    tokio::time::timeout(timeout, load)
        .await
        .map_err(|_| Error::Timeout(format!("browser fetch of {} exceeded {:?}", url, timeout)))?
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Rendering {} in browser", url);
        self.render(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_within_times_out_stalled_navigation() {
        let err = within(
            Duration::from_millis(50),
            "https://example.com",
            std::future::pending::<Result<String>>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(ref m) if m.contains("https://example.com")));
    }

    #[tokio::test]
    async fn test_within_passes_through_load_result() {
        let html = within(Duration::from_secs(1), "u", async { Ok("<html></html>".to_string()) })
            .await
            .unwrap();
        assert_eq!(html, "<html></html>");

        let err = within(Duration::from_secs(1), "u", async {
            Err(Error::Browser("tab crashed".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Browser(_)));
    }

    #[test]
    fn test_browser_pool_config_default() {
        let config = BrowserPoolConfig::default();
        assert_eq!(config.max_tabs, 4);
        assert!(config.headless);
        assert!(config.remote_url.is_none());
        assert!(config.port.is_none());
        assert!(config.proxy_url.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_browser_pool_config_from_fetcher_config() {
        let fetcher = FetcherConfig {
            web_driver: "/usr/bin/chromium".to_string(),
            web_driver_url: Some("http://127.0.0.1:9222".to_string()),
            web_driver_port: Some(9333),
            user_agent: "TestAgent/1.0".to_string(),
            timeout: 7,
            ..Default::default()
        };
        let config =
            BrowserPoolConfig::from_fetcher_config(&fetcher, false, Some("socks5://localhost:1080"));
        assert!(!config.headless);
        assert_eq!(config.web_driver, "/usr/bin/chromium");
        assert_eq!(config.remote_url.as_deref(), Some("http://127.0.0.1:9222"));
        assert_eq!(config.port, Some(9333));
        assert_eq!(config.proxy_url.as_deref(), Some("socks5://localhost:1080"));
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert_eq!(config.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_blank_remote_url_ignored() {
        let fetcher = FetcherConfig {
            web_driver_url: Some("  ".to_string()),
            ..Default::default()
        };
        let config = BrowserPoolConfig::from_fetcher_config(&fetcher, true, None);
        assert!(config.remote_url.is_none());
    }

    #[test]
    fn test_browser_pool_tabs() {
        let pool = BrowserPool::new(BrowserPoolConfig {
            max_tabs: 2,
            ..Default::default()
        });
        assert_eq!(pool.tab_semaphore().available_permits(), 2);

        let pool = BrowserPool::new(BrowserPoolConfig {
            max_tabs: 0,
            ..Default::default()
        });
        assert_eq!(pool.tab_semaphore().available_permits(), 1);
    }

    #[test]
    fn test_is_legacy_driver() {
        assert!(is_legacy_driver("chromedriver"));
        assert!(is_legacy_driver("/usr/local/bin/geckodriver"));
        assert!(is_legacy_driver("chromedriver.exe"));
        assert!(!is_legacy_driver("chromium"));
        assert!(!is_legacy_driver("/opt/google/chrome/chrome"));
    }

    #[test]
    fn test_resolve_executable_existing_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(resolve_executable(path), Some(file.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_browser_pool_shutdown_idempotent() {
        let pool = BrowserPool::new(BrowserPoolConfig::default());
        assert!(!pool.is_running().await);
        pool.shutdown().await;
        pool.shutdown().await;
        assert!(!pool.is_running().await);
    }

    #[tokio::test]
    async fn test_connect_unreachable_remote() {
        let pool = Arc::new(BrowserPool::new(BrowserPoolConfig {
            remote_url: Some("http://127.0.0.1:1".to_string()),
            timeout: Duration::from_secs(5),
            ..Default::default()
        }));
        let err = BrowserFetcher::new(pool).fetch("https://example.com").await.unwrap_err();
        assert!(
            matches!(err, Error::Browser(_) | Error::Timeout(_)),
            "got {:?}",
            err
        );
    }
}
