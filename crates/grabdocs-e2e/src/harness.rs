// Harness - one browser, one context, one page per test
//
// Owns the Playwright connection for the lifetime of a test. Tests log in
// through it, borrow its surface for flows, and close it when done.

use crate::config::E2eConfig;
use crate::error::{Error, Result};
use crate::flows::FlowContext;
use crate::locator::Resolver;
use crate::session::{AuthPath, SessionEstablisher};
use crate::surface::{PlaywrightSurface, Surface};
use playwright_rs::{Browser, BrowserContextOptions, LaunchOptions, Playwright};
use std::future::Future;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "grabdocs_e2e=info";

/// Installs the fmt subscriber once; later calls are no-ops.
///
/// `RUST_LOG` overrides the default `grabdocs_e2e=info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Runs `body` with a `budget` per attempt, retrying a failed attempt up to
/// `retries` times.
///
/// An attempt that outlives the budget fails with [`Error::TestTimeout`] and
/// is retried like any other failure. The last error is returned.
pub async fn run_with_retries<F, Fut, T>(
    name: &str,
    budget: Duration,
    retries: u32,
    mut body: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = retries + 1;
    let mut attempt = 1;
    loop {
        tracing::info!("Test '{}' started (attempt {}/{})", name, attempt, attempts);
        let result = match tokio::time::timeout(budget, body()).await {
            Ok(result) => result,
            Err(_) => Err(Error::TestTimeout {
                name: name.to_string(),
                timeout_ms: budget.as_millis() as u64,
            }),
        };
        match result {
            Ok(value) => {
                tracing::info!("Test '{}' passed", name);
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!("Test '{}' failed, retrying: {}", name, e);
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!("Test '{}' failed: {}", name, e);
                return Err(e);
            }
        }
    }
}

/// A launched browser with a logged-out page
pub struct Harness {
    playwright: Playwright,
    browser: Browser,
    surface: PlaywrightSurface,
    config: E2eConfig,
}

impl Harness {
    /// Launches Chromium (or Chrome) and opens a page in a download-accepting context.
    pub async fn launch(config: E2eConfig) -> Result<Self> {
        tracing::info!("Using baseURL: {}", config.base_url);

        let playwright = Playwright::launch().await?;

        let mut options = LaunchOptions::default().headless(config.headless);
        if let Some(channel) = config.browser.channel_name() {
            options = options.channel(channel.to_string());
        }
        if let Some(slow_mo) = config.slow_mo {
            options = options.slow_mo(slow_mo.as_millis() as f64);
        }
        let browser = playwright.chromium().launch_with_options(options).await?;
        tracing::debug!("Launched {} {}", browser.name(), browser.version());

        let context = browser
            .new_context_with_options(
                BrowserContextOptions::builder()
                    .accept_downloads(true)
                    .base_url(config.base_url.to_string())
                    .build(),
            )
            .await?;
        let page = context.new_page().await?;
        let surface = PlaywrightSurface::attach(page).await?;

        Ok(Self {
            playwright,
            browser,
            surface,
            config,
        })
    }

    pub fn config(&self) -> &E2eConfig {
        &self.config
    }

    pub fn surface(&self) -> &dyn Surface {
        &self.surface
    }

    pub fn flow_context(&self) -> FlowContext<'_> {
        FlowContext::new(&self.surface, &self.config)
    }

    pub fn establisher(&self) -> SessionEstablisher {
        SessionEstablisher::new(self.config.clone(), Resolver::default())
    }

    /// Authenticates the page: saved session, fresh login or interactive.
    pub async fn login(&self) -> Result<AuthPath> {
        self.establisher().establish(&self.surface).await
    }

    /// Runs `body` under the configured per-test budget and retry count.
    pub async fn run<F, Fut, T>(&self, name: &str, body: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        run_with_retries(name, self.config.test_timeout, self.config.retries(), body).await
    }

    /// Closes the browser and stops the Playwright server.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        if let Err(e) = self.playwright.shutdown().await {
            tracing::debug!("Playwright shutdown: {}", e);
        }
        Ok(())
    }
}
