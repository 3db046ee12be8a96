// PlaywrightSurface - Surface backed by a playwright-rs page
//
// Child frames are addressed through Playwright's frame-entering selector
// chain, so one page handle is enough to reach every iframe.

use super::{FrameRef, Surface, Target};
use crate::error::Result;
use async_trait::async_trait;
use playwright_rs::protocol::Download;
use playwright_rs::{
    BrowserContext, ClickOptions, Cookie, GotoOptions, Locator, Page, StorageState, WaitUntil,
};
use std::path::Path;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Surface driving a live browser page
pub struct PlaywrightSurface {
    page: Page,
    context: BrowserContext,
    downloads: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl PlaywrightSurface {
    /// Wraps a page and starts listening for its downloads.
    pub async fn attach(page: Page) -> Result<Self> {
        let context = page.context()?;
        let (tx, rx) = mpsc::unbounded_channel::<String>();

        page.on_download(move |download: Download| {
            let tx = tx.clone();
            async move {
                tracing::debug!("Download started: {}", download.suggested_filename());
                let _ = tx.send(download.suggested_filename().to_string());
                Ok(())
            }
        })
        .await?;

        Ok(Self {
            page,
            context,
            downloads: Mutex::new(rx),
        })
    }

    /// The underlying page
    pub fn page(&self) -> &Page {
        &self.page
    }

    fn selector_for(target: &Target) -> String {
        match target.frame {
            FrameRef::Main => target.selector.clone(),
            FrameRef::Child(index) => format!(
                "iframe >> nth={} >> internal:control=enter-frame >> {}",
                index, target.selector
            ),
        }
    }

    async fn locator(&self, target: &Target) -> Locator {
        self.page.locator(&Self::selector_for(target)).await
    }

    fn navigation_options() -> GotoOptions {
        GotoOptions::new().wait_until(WaitUntil::DomContentLoaded)
    }
}

#[async_trait]
impl Surface for PlaywrightSurface {
    async fn goto(&self, url: &str) -> Result<Option<u16>> {
        tracing::debug!("Navigating to {}", url);
        let response = self.page.goto(url, Some(Self::navigation_options())).await?;
        Ok(response.map(|r| r.status()))
    }

    async fn reload(&self) -> Result<()> {
        self.page.reload(Some(Self::navigation_options())).await?;
        Ok(())
    }

    fn url(&self) -> String {
        self.page.url()
    }

    async fn child_frame_count(&self) -> Result<usize> {
        Ok(self.page.locator("iframe").await.count().await?)
    }

    async fn is_visible(&self, target: &Target) -> Result<bool> {
        Ok(self.locator(target).await.is_visible().await?)
    }

    async fn is_enabled(&self, target: &Target) -> Result<bool> {
        Ok(self.locator(target).await.is_enabled().await?)
    }

    async fn count(&self, target: &Target) -> Result<usize> {
        Ok(self.locator(target).await.count().await?)
    }

    async fn text_content(&self, target: &Target) -> Result<Option<String>> {
        Ok(self.locator(target).await.text_content().await?)
    }

    async fn attribute(&self, target: &Target, name: &str) -> Result<Option<String>> {
        Ok(self.locator(target).await.get_attribute(name).await?)
    }

    async fn input_value(&self, target: &Target) -> Result<String> {
        Ok(self.locator(target).await.input_value(None).await?)
    }

    async fn fill(&self, target: &Target, value: &str) -> Result<()> {
        Ok(self.locator(target).await.fill(value, None).await?)
    }

    async fn click(&self, target: &Target, force: bool) -> Result<()> {
        let options = force.then(|| ClickOptions::builder().force(true).build());
        Ok(self.locator(target).await.click(options).await?)
    }

    async fn hover(&self, target: &Target) -> Result<()> {
        Ok(self.locator(target).await.hover(None).await?)
    }

    async fn press(&self, target: &Target, key: &str) -> Result<()> {
        Ok(self.locator(target).await.press(key, None).await?)
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        Ok(self.page.keyboard().press(key, None).await?)
    }

    async fn set_input_files(&self, target: &Target, path: &Path) -> Result<()> {
        let file = path.to_path_buf();
        Ok(self.locator(target).await.set_input_files(&file, None).await?)
    }

    async fn body_text(&self) -> Result<String> {
        let body = self.page.locator("body").await;
        Ok(body.text_content().await?.unwrap_or_default())
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        Ok(self
            .page
            .evaluate::<(), serde_json::Value>(expression, None)
            .await?)
    }

    async fn storage_state(&self) -> Result<StorageState> {
        Ok(self.context.storage_state().await?)
    }

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        Ok(self.context.add_cookies(cookies).await?)
    }

    async fn pause(&self) -> Result<()> {
        Ok(self.page.pause().await?)
    }

    async fn click_expecting_download(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let mut downloads = self.downloads.lock().await;
        // Drop downloads triggered by earlier actions
        while downloads.try_recv().is_ok() {}

        self.click(target, false).await?;

        match tokio::time::timeout(timeout, downloads.recv()).await {
            Ok(filename) => Ok(filename),
            Err(_) => {
                tracing::debug!("No download within {:?} after clicking {}", timeout, target);
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for PlaywrightSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaywrightSurface")
            .field("url", &self.page.url())
            .finish()
    }
}
