// Resilient element resolution
//
// An intent ("the e-mail field", "the delete icon of this row") is an ordered
// list of selectors, most specific first. The resolver polls the live page in
// rounds: every candidate against the main document, then against each child
// frame, each with a short visibility check. The first visible match wins.
//
// See also: scan.rs for the bounded keyword fallback used when no candidate
// list matches.

pub mod catalog;
pub mod scan;

pub use scan::{KeywordRule, KeywordScan};

use crate::error::{Error, Result};
use crate::surface::{FrameRef, Surface, Target};
use std::time::Duration;
use tokio::time::Instant;

/// Per-candidate visibility check budget (200ms, as in the live suite)
pub const DEFAULT_PER_CHECK: Duration = Duration::from_millis(200);

/// Pause between polling rounds
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Ordered selector candidates describing one UI intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    intent: String,
    selectors: Vec<String>,
}

impl Candidates {
    /// Creates a candidate list, keeping order and dropping duplicates
    pub fn new<I, S>(intent: impl Into<String>, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for selector in selectors.into_iter().map(Into::into) {
            if !selector.is_empty() && !unique.contains(&selector) {
                unique.push(selector);
            }
        }
        Self {
            intent: intent.into(),
            selectors: unique,
        }
    }

    /// Like [`Candidates::new`], but also drops values that cannot be selectors.
    ///
    /// Used where values come from configuration: an e-mail address or free
    /// text pasted into a selector variable must never be looked up.
    pub fn sanitized<I, S>(intent: impl Into<String>, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kept: Vec<String> = selectors
            .into_iter()
            .map(Into::into)
            .filter(|s| looks_like_selector(s))
            .collect();
        Self::new(intent, kept)
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Same intent with one more candidate placed first
    pub fn preferring(mut self, selector: Option<&str>) -> Self {
        if let Some(s) = selector.filter(|s| looks_like_selector(s)) {
            self.selectors.retain(|existing| existing != s);
            self.selectors.insert(0, s.to_string());
        }
        self
    }
}

/// Rejects empty values and values with a bare `@` or space.
///
/// Spaces and `@` inside quotes, brackets or parentheses are fine:
/// `button:has-text("Sign in")` is a selector, `qa@example.com` is not.
pub fn looks_like_selector(candidate: &str) -> bool {
    if candidate.trim().is_empty() {
        return false;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in candidate.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') | (None, '[') => depth += 1,
            (None, ')') | (None, ']') => depth = depth.saturating_sub(1),
            (None, ' ') | (None, '@') if depth == 0 => return false,
            _ => {}
        }
    }
    true
}

/// Finds the first visible match for an intent within a time budget.
#[derive(Debug, Clone, Copy)]
pub struct Resolver {
    per_check: Duration,
    poll_interval: Duration,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DEFAULT_PER_CHECK, DEFAULT_POLL_INTERVAL)
    }
}

impl Resolver {
    pub fn new(per_check: Duration, poll_interval: Duration) -> Self {
        Self {
            per_check,
            poll_interval,
        }
    }

    pub fn per_check(&self) -> Duration {
        self.per_check
    }

    /// One bounded visibility check. Errors and slow answers count as "not visible".
    pub async fn probe(&self, surface: &dyn Surface, target: &Target) -> bool {
        matches!(
            tokio::time::timeout(self.per_check, surface.is_visible(target)).await,
            Ok(Ok(true))
        )
    }

    /// Returns the winning selector string.
    pub async fn wait_for_any(
        &self,
        surface: &dyn Surface,
        candidates: &Candidates,
        timeout: Duration,
    ) -> Result<String> {
        self.search(surface, None, candidates, timeout, false)
            .await
            .map(|(selector, _)| selector)
    }

    /// Returns a handle on the first visible match.
    pub async fn resolve(
        &self,
        surface: &dyn Surface,
        candidates: &Candidates,
        timeout: Duration,
    ) -> Result<Target> {
        self.search(surface, None, candidates, timeout, false)
            .await
            .map(|(_, target)| target)
    }

    /// First visible match that is also enabled.
    pub async fn resolve_enabled(
        &self,
        surface: &dyn Surface,
        candidates: &Candidates,
        timeout: Duration,
    ) -> Result<Target> {
        self.search(surface, None, candidates, timeout, true)
            .await
            .map(|(_, target)| target)
    }

    /// First visible match inside `root`'s subtree.
    pub async fn resolve_within(
        &self,
        surface: &dyn Surface,
        root: &Target,
        candidates: &Candidates,
        timeout: Duration,
    ) -> Result<Target> {
        self.search(surface, Some(root), candidates, timeout, false)
            .await
            .map(|(_, target)| target)
    }

    /// Like [`Resolver::resolve`] but absence is `None` rather than an error.
    pub async fn try_resolve(
        &self,
        surface: &dyn Surface,
        candidates: &Candidates,
        timeout: Duration,
    ) -> Option<Target> {
        self.resolve(surface, candidates, timeout).await.ok()
    }

    async fn search(
        &self,
        surface: &dyn Surface,
        root: Option<&Target>,
        candidates: &Candidates,
        timeout: Duration,
        require_enabled: bool,
    ) -> Result<(String, Target)> {
        let deadline = Instant::now() + timeout;
        let mut last_error: Option<String> = None;

        loop {
            let frames = match root {
                Some(r) => vec![r.frame],
                None => self.frames(surface).await,
            };

            for selector in candidates.selectors() {
                for frame in &frames {
                    let target = match root {
                        Some(r) => r.within(selector).first(),
                        None => Target::new(*frame, selector.as_str()).first(),
                    };

                    match tokio::time::timeout(self.per_check, surface.is_visible(&target)).await {
                        Ok(Ok(true)) => {
                            if require_enabled && !surface.is_enabled(&target).await.unwrap_or(false)
                            {
                                continue;
                            }
                            tracing::debug!("{}: matched {}", candidates.intent(), target);
                            return Ok((selector.clone(), target));
                        }
                        Ok(Ok(false)) | Err(_) => {}
                        Ok(Err(e)) => last_error = Some(e.to_string()),
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }

        tracing::debug!("{}: no candidate matched within {:?}", candidates.intent(), timeout);
        Err(Error::NotFound {
            intent: candidates.intent().to_string(),
            tried: candidates.selectors().to_vec(),
            url: surface.url(),
            last_error: last_error.unwrap_or_else(|| "not found in any frame".to_string()),
        })
    }

    async fn frames(&self, surface: &dyn Surface) -> Vec<FrameRef> {
        let children = surface.child_frame_count().await.unwrap_or(0);
        std::iter::once(FrameRef::Main)
            .chain((0..children).map(FrameRef::Child))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_preserve_order_and_drop_duplicates() {
        let c = Candidates::new("email", ["#email", "input[type=\"email\"]", "#email", ""]);
        assert_eq!(c.selectors(), &["#email", "input[type=\"email\"]"]);
        assert_eq!(c.intent(), "email");
    }

    #[test]
    fn test_sanitized_rejects_values_that_are_not_selectors() {
        let c = Candidates::sanitized(
            "email",
            [
                "qa@example.com",
                "just some words",
                "button:has-text(\"Sign in\")",
                "input[placeholder*=\"code\" i]",
                "#email",
            ],
        );
        assert_eq!(
            c.selectors(),
            &[
                "button:has-text(\"Sign in\")",
                "input[placeholder*=\"code\" i]",
                "#email"
            ]
        );
    }

    #[test]
    fn test_preferring_moves_override_first() {
        let c = Candidates::new("submit", ["button[type=\"submit\"]", "#go"])
            .preferring(Some("#go"))
            .preferring(None)
            .preferring(Some("me@example.com"));
        assert_eq!(c.selectors(), &["#go", "button[type=\"submit\"]"]);
    }

    #[test]
    fn test_looks_like_selector() {
        assert!(looks_like_selector("[data-testid=\"login-email\"]"));
        assert!(looks_like_selector("internal:role=button[name=/verify/i]"));
        assert!(!looks_like_selector("   "));
        assert!(!looks_like_selector("tbody tr"));
        assert!(!looks_like_selector("user@host"));
    }
}
