// Surface - the browser as seen by the resolver and the login machine
//
// Everything above this trait speaks in selectors and frames. Everything below
// it is the automation library. Keeping the seam narrow lets the login state
// machine and the resolver run against a scripted page in tests.

mod playwright;

pub use playwright::PlaywrightSurface;

use crate::error::Result;
use async_trait::async_trait;
use playwright_rs::{Cookie, StorageState};
use std::path::Path;
use std::time::Duration;

/// Which document a selector is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRef {
    /// The top-level document
    Main,
    /// The n-th child frame of the top-level document, in document order
    Child(usize),
}

/// One element candidate: a selector chain inside one frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub frame: FrameRef,
    pub selector: String,
}

impl Target {
    pub fn new(frame: FrameRef, selector: impl Into<String>) -> Self {
        Self {
            frame,
            selector: selector.into(),
        }
    }

    /// Target in the top-level document
    pub fn main(selector: impl Into<String>) -> Self {
        Self::new(FrameRef::Main, selector)
    }

    /// Restricts this target to its first match
    pub fn first(&self) -> Target {
        self.nth(0)
    }

    /// Restricts this target to its n-th match (0-indexed)
    pub fn nth(&self, index: usize) -> Target {
        Target::new(self.frame, format!("{} >> nth={}", self.selector, index))
    }

    /// Sub-target inside this target's subtree
    pub fn within(&self, selector: &str) -> Target {
        Target::new(self.frame, format!("{} >> {}", self.selector, selector))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.frame {
            FrameRef::Main => write!(f, "{}", self.selector),
            FrameRef::Child(i) => write!(f, "{} (frame {})", self.selector, i),
        }
    }
}

/// Browser operations the suite relies on.
///
/// Implementations report what the page currently shows; they do not retry.
/// Retrying and deadline handling belong to [`crate::locator::Resolver`] and
/// [`crate::outcome::Outcome`].
#[async_trait]
pub trait Surface: Send + Sync {
    /// Navigates to an absolute URL, returning the HTTP status when there is a response
    async fn goto(&self, url: &str) -> Result<Option<u16>>;

    /// Reloads the current document
    async fn reload(&self) -> Result<()>;

    /// Last committed URL of the top-level document
    fn url(&self) -> String;

    /// Number of child frames in the top-level document
    async fn child_frame_count(&self) -> Result<usize>;

    async fn is_visible(&self, target: &Target) -> Result<bool>;

    async fn is_enabled(&self, target: &Target) -> Result<bool>;

    async fn count(&self, target: &Target) -> Result<usize>;

    async fn text_content(&self, target: &Target) -> Result<Option<String>>;

    async fn attribute(&self, target: &Target, name: &str) -> Result<Option<String>>;

    async fn input_value(&self, target: &Target) -> Result<String>;

    async fn fill(&self, target: &Target, value: &str) -> Result<()>;

    /// Clicks the element; `force` skips actionability checks
    async fn click(&self, target: &Target, force: bool) -> Result<()>;

    async fn hover(&self, target: &Target) -> Result<()>;

    /// Presses a key (or types a single character) with the element focused
    async fn press(&self, target: &Target, key: &str) -> Result<()>;

    /// Presses a key on whatever currently has focus
    async fn press_key(&self, key: &str) -> Result<()>;

    async fn set_input_files(&self, target: &Target, path: &Path) -> Result<()>;

    /// Text content of the whole body
    async fn body_text(&self) -> Result<String>;

    /// Evaluates a JavaScript expression in the top-level document
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value>;

    /// Cookies and local storage of the browsing context
    async fn storage_state(&self) -> Result<StorageState>;

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()>;

    /// Hands control to a human through the inspector
    async fn pause(&self) -> Result<()>;

    /// Clicks and waits up to `timeout` for a download.
    ///
    /// Returns the suggested filename, or `None` when no download started.
    async fn click_expecting_download(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<Option<String>>;
}
