use std::path::PathBuf;
use std::time::Duration;

use domus_core::util::pick;

/// Desktop Chrome identities a run may present as.
pub const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36",
];

pub const WINDOW_SIZE: (u32, u32) = (1920, 1080);

/// Per-run browser identity and wait bounds.
///
/// The user agent is drawn once in [`SessionConfig::new`] and reused for
/// every browser session of the run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    user_agent: String,
    /// How long to wait for the family's root content region.
    pub root_wait: Duration,
    /// How long to wait for each optional region.
    pub optional_wait: Duration,
    pub navigation_timeout: Duration,
    /// Pixels per scroll step.
    pub scroll_step: u32,
    /// Upper bound of the random pause after each scroll step.
    pub scroll_pause_max: Duration,
    /// Explicit Chrome/Chromium binary. Auto-detected when `None`.
    pub chrome_executable: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new() -> Self {
        let user_agent = pick(&USER_AGENTS).copied().unwrap_or(USER_AGENTS[0]);
        Self {
            user_agent: user_agent.to_string(),
            root_wait: Duration::from_secs(15),
            optional_wait: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(60),
            scroll_step: 500,
            scroll_pause_max: Duration::from_secs(1),
            chrome_executable: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_root_wait(mut self, wait: Duration) -> Self {
        self.root_wait = wait;
        self
    }

    pub fn with_optional_wait(mut self, wait: Duration) -> Self {
        self.optional_wait = wait;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Command-line flags for the headless browser.
    ///
    /// `--enable-automation` is never passed: default args are disabled by
    /// the launcher, and this list does not add it back.
    pub fn browser_args(&self) -> Vec<String> {
        vec![
            "--headless=new".to_string(),
            "--disable-gpu".to_string(),
            format!("--window-size={},{}", WINDOW_SIZE.0, WINDOW_SIZE.1),
            format!("--user-agent={}", self.user_agent),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-first-run".to_string(),
        ]
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
