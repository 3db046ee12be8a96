// Run configuration
//
// Every knob the suite reads from the environment lives here, parsed once and
// passed by reference into the harness, the session establisher and the flows.
// Empty values count as unset.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Base URL used when `E2E_BASE_URL` is not set
pub const DEFAULT_BASE_URL: &str = "https://app.grabdocs.com";

/// Location of the persisted session snapshot, relative to the working directory
pub const DEFAULT_STORAGE_STATE_PATH: &str = ".auth/storage-state.json";

/// Suite-level budget per test (3 minutes covers login with OTP)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Login routes tried after the configured one, in order
const FALLBACK_LOGIN_PATHS: &[&str] = &[
    "/login",
    "/auth/login",
    "/signin",
    "/auth/sign-in",
    "/users/sign_in",
];

/// How the second authentication factor is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OtpMode {
    /// Type the configured literal code
    #[default]
    Code,
    /// Wait while a human enters the code in the live browser
    Manual,
}

impl OtpMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "code" => Some(OtpMode::Code),
            "manual" => Some(OtpMode::Manual),
            _ => None,
        }
    }
}

/// Browser build the harness launches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserChannel {
    /// Playwright's bundled Chromium
    #[default]
    Chromium,
    /// Locally installed Google Chrome
    Chrome,
}

impl BrowserChannel {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "chromium" => Some(BrowserChannel::Chromium),
            "chrome" | "google-chrome" => Some(BrowserChannel::Chrome),
            _ => None,
        }
    }

    /// Channel name passed to Playwright, if any
    pub fn channel_name(&self) -> Option<&'static str> {
        match self {
            BrowserChannel::Chromium => None,
            BrowserChannel::Chrome => Some("chrome"),
        }
    }
}

/// Identifier and secret for the account under test
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Selector overrides for markup the built-in candidates miss
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorOverrides {
    pub email: Option<String>,
    pub password: Option<String>,
    pub submit: Option<String>,
}

/// Immutable configuration for one suite run
#[derive(Debug, Clone)]
pub struct E2eConfig {
    /// Application origin every route is joined onto
    pub base_url: Url,
    /// Delay inserted by Playwright between operations
    pub slow_mo: Option<Duration>,
    /// Login route tried before the built-in fallbacks
    pub login_path: Option<String>,
    pub selector_overrides: SelectorOverrides,
    pub credentials: Credentials,
    pub otp_mode: OtpMode,
    pub otp_code: Option<String>,
    /// Reuse and refresh the persisted session snapshot
    pub reuse_session: bool,
    /// Pause for a human to complete the login form
    pub interactive_login: bool,
    pub storage_state_path: PathBuf,
    pub browser: BrowserChannel,
    pub headless: bool,
    pub test_timeout: Duration,
    /// Running under continuous integration
    pub ci: bool,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            slow_mo: None,
            login_path: None,
            selector_overrides: SelectorOverrides::default(),
            credentials: Credentials::default(),
            otp_mode: OtpMode::default(),
            otp_code: None,
            reuse_session: true,
            interactive_login: false,
            storage_state_path: PathBuf::from(DEFAULT_STORAGE_STATE_PATH),
            browser: BrowserChannel::default(),
            headless: true,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            ci: false,
        }
    }
}

impl E2eConfig {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = E2eConfig::default();

        if let Some(raw) = get("E2E_BASE_URL") {
            config.base_url =
                Url::parse(&raw).map_err(|e| Error::config("E2E_BASE_URL", e.to_string()))?;
        }
        if let Some(raw) = get("E2E_SLOWMO") {
            config.slow_mo = Some(parse_millis("E2E_SLOWMO", &raw)?);
        }
        config.login_path = get("E2E_LOGIN_PATH");
        config.selector_overrides = SelectorOverrides {
            email: get("E2E_LOGIN_EMAIL_SELECTOR"),
            password: get("E2E_LOGIN_PASSWORD_SELECTOR"),
            submit: get("E2E_LOGIN_SUBMIT_SELECTOR"),
        };
        config.credentials = Credentials {
            email: get("E2E_EMAIL").unwrap_or_default(),
            password: get("E2E_PASSWORD").unwrap_or_default(),
        };
        if let Some(raw) = get("E2E_OTP_MODE") {
            config.otp_mode = OtpMode::parse(&raw)
                .ok_or_else(|| Error::config("E2E_OTP_MODE", format!("expected 'code' or 'manual', got '{}'", raw)))?;
        }
        config.otp_code = get("E2E_OTP_CODE");
        config.reuse_session = get("E2E_USE_SAVED_STATE")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        config.interactive_login = get("E2E_INTERACTIVE_LOGIN")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        if let Some(raw) = get("E2E_STORAGE_STATE_PATH") {
            config.storage_state_path = PathBuf::from(raw);
        }
        if let Some(raw) = get("E2E_BROWSER_CHANNEL") {
            config.browser = BrowserChannel::parse(&raw).ok_or_else(|| {
                Error::config("E2E_BROWSER_CHANNEL", format!("unknown channel '{}'", raw))
            })?;
        }
        if let Some(raw) = get("E2E_HEADLESS") {
            config.headless = !(raw.eq_ignore_ascii_case("false") || raw == "0");
        }
        if let Some(raw) = get("E2E_TEST_TIMEOUT_MS") {
            config.test_timeout = parse_millis("E2E_TEST_TIMEOUT_MS", &raw)?;
        }
        config.ci = get("CI").is_some_and(|v| !v.eq_ignore_ascii_case("false") && v != "0");

        Ok(config)
    }

    /// Login routes to try: the configured one first, then the fallbacks.
    pub fn candidate_login_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        let configured = self.login_path.iter().map(String::as_str);
        for path in configured.chain(FALLBACK_LOGIN_PATHS.iter().copied()) {
            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_string());
            }
        }
        paths
    }

    /// Absolute URL for an application route
    pub fn url_for(&self, path: &str) -> String {
        match self.base_url.join(path) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path),
        }
    }

    /// Retry count the runner applies to failing tests
    pub fn retries(&self) -> u32 {
        if self.ci { 2 } else { 0 }
    }
}

fn parse_millis(variable: &str, raw: &str) -> Result<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| Error::config(variable, format!("expected milliseconds, got '{}'", raw)))
}
