use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use domus_core::error::AppError;
use domus_core::models::RawBag;
use domus_core::registry::SourceFamily;
use domus_core::traits::PageExtractor;
use domus_core::util::jitter_between;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::parse;
use crate::proxy::ProxyConfig;
use crate::session::{SessionConfig, WINDOW_SIZE};

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Headless-browser extractor using Chromium via the Chrome DevTools Protocol.
///
/// Every [`PageExtractor::extract`] call launches its own Chromium process,
/// navigates through the rendering proxy, scrolls the page to trigger lazy
/// content, takes one DOM snapshot and shuts the browser down. Nothing is
/// shared between items except the run's [`SessionConfig`].
///
/// # Example
///
/// ```rust,no_run
/// use domus_client::{BrowserExtractor, ProxyConfig, SessionConfig};
/// use domus_core::registry::SourceFamily;
/// use domus_core::traits::PageExtractor;
///
/// # async fn run() {
/// let extractor = BrowserExtractor::new(SessionConfig::new(), ProxyConfig::direct());
/// let bag = extractor
///     .extract(SourceFamily::Olx, "https://www.olx.ro/d/oferta/example.html")
///     .await;
/// println!("{}", bag.render_text());
/// # }
/// ```
#[derive(Clone)]
pub struct BrowserExtractor {
    session: Arc<SessionConfig>,
    proxy: Arc<ProxyConfig>,
}

impl BrowserExtractor {
    pub fn new(session: SessionConfig, proxy: ProxyConfig) -> Self {
        tracing::info!(user_agent = %session.user_agent(), direct = proxy.is_direct(), "Browser session identity");
        Self {
            session: Arc::new(session),
            proxy: Arc::new(proxy),
        }
    }

    async fn try_extract(&self, family: SourceFamily, url: &str) -> Result<RawBag, AppError> {
        let target = self.proxy.proxied_url(url)?;
        let session = BrowserSession::launch(&self.session).await?;
        let result = self.read_page(&session, family, url, &target).await;
        session.close().await;
        result
    }

    async fn read_page(
        &self,
        session: &BrowserSession,
        family: SourceFamily,
        url: &str,
        target: &str,
    ) -> Result<RawBag, AppError> {
        let nav_timeout = self.session.navigation_timeout;
        let page = tokio::time::timeout(nav_timeout, session.browser.new_page(target))
            .await
            .map_err(|_| AppError::Timeout(nav_timeout.as_secs()))?
            .map_err(|e| AppError::BrowserError(format!("Failed to navigate to {url}: {e}")))?;

        let root = parse::root_selector(family);
        if !wait_for(&page, root, self.session.root_wait).await {
            let _ = page.close().await;
            return Ok(RawBag::error(
                url,
                format!(
                    "Main content region {root} not found within {}s",
                    self.session.root_wait.as_secs()
                ),
            ));
        }
        tracing::debug!(%url, "Root region present");

        scroll_through(&page, self.session.scroll_step, self.session.scroll_pause_max).await?;

        for selector in parse::optional_selectors(family) {
            if !wait_for(&page, selector, self.session.optional_wait).await {
                tracing::debug!(%url, %selector, "Optional region not found");
            }
        }

        let html = page
            .content()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to read page content: {e}")))?;
        let _ = page.close().await;

        Ok(parse::parse_snapshot(family, url, &html))
    }
}

impl PageExtractor for BrowserExtractor {
    async fn extract(&self, family: SourceFamily, url: &str) -> RawBag {
        tracing::info!(%url, %family, "Extracting listing page");
        match self.try_extract(family, url).await {
            Ok(bag) => bag,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Extraction failed");
                RawBag::error(url, e.to_string())
            }
        }
    }
}

/// One Chromium process plus its CDP handler task.
///
/// Always consumed by [`BrowserSession::close`]. If that is skipped (panic,
/// cancelled future) the child process is killed when `Browser` drops.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(config: &SessionConfig) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .window_size(WINDOW_SIZE.0, WINDOW_SIZE.1);

        if let Some(bin) = config.chrome_executable.clone().or_else(find_chrome_binary) {
            tracing::debug!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }
        for arg in config.browser_args() {
            builder = builder.arg(arg.as_str());
        }

        let browser_config = builder
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!(error = %e, "Browser close failed, killing process");
            let _ = self.browser.kill().await;
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// Poll for `selector` until it appears or `within` elapses.
async fn wait_for(page: &Page, selector: &str, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
    }
}

/// Scroll top to bottom in `step` pixel increments with short random
/// pauses, then once more to the very bottom.
async fn scroll_through(page: &Page, step: u32, pause_max: Duration) -> Result<(), AppError> {
    let height: f64 = page
        .evaluate("document.body.scrollHeight")
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to read page height: {e}")))?
        .into_value()
        .map_err(|e| AppError::BrowserError(format!("Unexpected page height: {e}")))?;

    let height = height.max(0.0) as u64;
    let step = u64::from(step.max(1));
    let mut y = 0;
    while y < height {
        page.evaluate(format!("window.scrollTo(0, {y});"))
            .await
            .map_err(|e| AppError::BrowserError(format!("Scroll failed: {e}")))?;
        tokio::time::sleep(jitter_between(Duration::ZERO, pause_max)).await;
        y += step;
    }

    page.evaluate("window.scrollTo(0, document.body.scrollHeight);")
        .await
        .map_err(|e| AppError::BrowserError(format!("Scroll failed: {e}")))?;
    tokio::time::sleep(jitter_between(Duration::ZERO, pause_max)).await;
    Ok(())
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// On systems where Chromium is installed via **snap**, the wrapper at
/// `/snap/bin/chromium` strips unknown CLI flags, breaking headless mode.
/// We look for the real binary inside the snap first, then fall back to
/// well-known system paths. If nothing is found we return `None` and let
/// `chromiumoxide` do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
