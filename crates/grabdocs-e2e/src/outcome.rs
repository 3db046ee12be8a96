// Outcome - tolerant-OR verification
//
// A feature may legitimately finish in more than one UI shape (toast, modal,
// refreshed list). An Outcome lists every accepted signal, polls them side by
// side and reports the first one actually observed.

use crate::error::{Error, Result};
use crate::locator::{Candidates, Resolver};
use crate::surface::Surface;
use futures_util::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::Instant;

/// Default polling interval for outcome signals
pub const DEFAULT_SIGNAL_INTERVAL: Duration = Duration::from_millis(250);

static DASHBOARD_OR_UPLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(dashboard|upload)(/|$)").expect("static pattern"));

static LOGIN_SURFACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(login|signin|sign-in|sign_in)(/|$)").expect("static pattern")
});

/// Which part of the URL a pattern is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Url,
    Path,
}

/// A regular expression matched against the current URL.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    regex: Regex,
    scope: Scope,
}

impl UrlPattern {
    /// Pattern matched against the whole URL
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(|regex| UrlPattern {
                regex,
                scope: Scope::Url,
            })
            .map_err(|e| Error::InvalidArgument(format!("Invalid regex: {}", e)))
    }

    /// Pattern matched against the URL path only, ignoring query and fragment
    pub fn path(pattern: &str) -> Result<Self> {
        let mut pattern = Self::new(pattern)?;
        pattern.scope = Scope::Path;
        Ok(pattern)
    }

    /// Routes reached after a successful login
    pub fn dashboard_or_upload() -> Self {
        UrlPattern {
            regex: DASHBOARD_OR_UPLOAD.clone(),
            scope: Scope::Path,
        }
    }

    /// Routes that mean the session is not (or no longer) authenticated
    pub fn login_surface() -> Self {
        UrlPattern {
            regex: LOGIN_SURFACE.clone(),
            scope: Scope::Path,
        }
    }

    pub fn is_match(&self, url: &str) -> bool {
        match self.scope {
            Scope::Url => self.regex.is_match(url),
            Scope::Path => self.regex.is_match(&path_of(url)),
        }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

fn path_of(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative or unparsable: cut at the query or fragment
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// True when `url` is a post-login route and not a login surface.
pub fn is_signed_in_url(url: &str) -> bool {
    !UrlPattern::login_surface().is_match(url) && UrlPattern::dashboard_or_upload().is_match(url)
}

/// Polls the current URL until it matches `pattern` or `timeout` elapses.
pub async fn wait_for_url(
    surface: &dyn Surface,
    pattern: &UrlPattern,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if pattern.is_match(&surface.url()) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// One accepted way for an action to have succeeded.
#[derive(Debug, Clone)]
pub enum Signal {
    /// An element matching the selector is visible in any frame
    Visible(String),
    /// Any of the selectors is visible in any frame
    AnyVisible(Vec<String>),
    /// The body text contains the substring (case-insensitive)
    BodyContains(String),
    /// The current URL matches
    UrlMatches(UrlPattern),
    /// The body holds more than this many characters of text
    BodyLongerThan(usize),
}

impl Signal {
    pub fn label(&self) -> String {
        match self {
            Signal::Visible(selector) => format!("visible {}", selector),
            Signal::AnyVisible(selectors) => format!("any visible of [{}]", selectors.join(", ")),
            Signal::BodyContains(text) => format!("page text contains '{}'", text),
            Signal::UrlMatches(pattern) => format!("url matches /{}/", pattern.as_str()),
            Signal::BodyLongerThan(n) => format!("page has more than {} characters", n),
        }
    }

    /// Single non-blocking check
    pub async fn observed(&self, surface: &dyn Surface, resolver: &Resolver) -> bool {
        match self {
            Signal::Visible(selector) => {
                let candidates = Candidates::new("outcome signal", [selector.as_str()]);
                resolver
                    .wait_for_any(surface, &candidates, Duration::ZERO)
                    .await
                    .is_ok()
            }
            Signal::AnyVisible(selectors) => {
                let candidates = Candidates::new("outcome signal", selectors.iter().cloned());
                resolver
                    .wait_for_any(surface, &candidates, Duration::ZERO)
                    .await
                    .is_ok()
            }
            Signal::BodyContains(text) => match surface.body_text().await {
                Ok(body) => body.to_lowercase().contains(&text.to_lowercase()),
                Err(_) => false,
            },
            Signal::UrlMatches(pattern) => pattern.is_match(&surface.url()),
            Signal::BodyLongerThan(n) => match surface.body_text().await {
                Ok(body) => body.trim().chars().count() > *n,
                Err(_) => false,
            },
        }
    }
}

/// A set of accepted signals for one action.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    signals: Vec<Signal>,
}

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn visible(self, selector: impl Into<String>) -> Self {
        self.signal(Signal::Visible(selector.into()))
    }

    pub fn any_visible<I, S>(self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signal(Signal::AnyVisible(
            selectors.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn body_contains(self, text: impl Into<String>) -> Self {
        self.signal(Signal::BodyContains(text.into()))
    }

    pub fn url_matches(self, pattern: UrlPattern) -> Self {
        self.signal(Signal::UrlMatches(pattern))
    }

    pub fn body_longer_than(self, chars: usize) -> Self {
        self.signal(Signal::BodyLongerThan(chars))
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Polls every signal until one is observed or `timeout` elapses.
    ///
    /// Returns the label of the winning signal. Signals still pending when
    /// one wins are dropped.
    pub async fn any(
        &self,
        surface: &dyn Surface,
        resolver: &Resolver,
        timeout: Duration,
    ) -> Option<String> {
        let deadline = Instant::now() + timeout;
        let interval = DEFAULT_SIGNAL_INTERVAL;

        let mut pending: FuturesUnordered<_> = self
            .signals
            .iter()
            .map(|signal| poll_signal(signal, surface, resolver, deadline, interval))
            .collect();

        while let Some(result) = pending.next().await {
            if let Some(label) = result {
                tracing::info!("Outcome observed: {}", label);
                return Some(label);
            }
        }

        tracing::debug!("No outcome observed within {:?}", timeout);
        None
    }

    /// Like [`Outcome::any`] but a miss is an assertion failure.
    pub async fn require(
        &self,
        surface: &dyn Surface,
        resolver: &Resolver,
        timeout: Duration,
        what: &str,
    ) -> Result<String> {
        match self.any(surface, resolver, timeout).await {
            Some(label) => Ok(label),
            None => {
                let accepted: Vec<String> = self.signals.iter().map(Signal::label).collect();
                Err(Error::AssertionFailed(format!(
                    "{}: none of [{}] observed within {:?} (at '{}')",
                    what,
                    accepted.join("; "),
                    timeout,
                    surface.url()
                )))
            }
        }
    }
}

async fn poll_signal(
    signal: &Signal,
    surface: &dyn Surface,
    resolver: &Resolver,
    deadline: Instant,
    interval: Duration,
) -> Option<String> {
    loop {
        if signal.observed(surface, resolver).await {
            return Some(signal.label());
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Polls until no candidate is visible, e.g. a loading indicator.
///
/// Returns `false` if something was still visible at the deadline.
pub async fn wait_until_gone(
    surface: &dyn Surface,
    resolver: &Resolver,
    candidates: &Candidates,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if resolver
            .wait_for_any(surface, candidates, Duration::ZERO)
            .await
            .is_err()
        {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(DEFAULT_SIGNAL_INTERVAL.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_pattern() {
        let p = UrlPattern::dashboard_or_upload();
        assert!(p.is_match("https://app.grabdocs.com/dashboard"));
        assert!(p.is_match("https://app.grabdocs.com/upload?tab=recent"));
        assert!(p.is_match("https://app.grabdocs.com/dashboard/files"));
        assert!(!p.is_match("https://app.grabdocs.com/login"));
        assert!(!p.is_match("https://app.grabdocs.com/login?next=/upload"));
        assert!(!p.is_match("https://app.grabdocs.com/login#/dashboard"));
        assert!(!p.is_match("https://app.grabdocs.com/uploads-archive"));
    }

    #[test]
    fn test_signed_in_url() {
        assert!(is_signed_in_url("https://app.grabdocs.com/upload"));
        assert!(!is_signed_in_url("https://app.grabdocs.com/login?next=/dashboard"));
        assert!(!is_signed_in_url("https://app.grabdocs.com/files"));
    }

    #[test]
    fn test_path_pattern_ignores_query() {
        let p = UrlPattern::path(r"^/links/\d+$").unwrap();
        assert!(p.is_match("https://app.grabdocs.com/links/12?ref=/links/x"));
        assert!(!p.is_match("https://app.grabdocs.com/home?next=/links/12"));
        assert!(UrlPattern::new(r"/links/\d+").unwrap().is_match("https://a.b/home?next=/links/12"));
    }

    #[test]
    fn test_login_surface_pattern() {
        let p = UrlPattern::login_surface();
        assert!(p.is_match("https://app.grabdocs.com/login?next=/upload"));
        assert!(p.is_match("https://app.grabdocs.com/signin"));
        assert!(p.is_match("https://app.grabdocs.com/users/sign_in"));
        assert!(p.is_match("https://app.grabdocs.com/auth/login/"));
        assert!(!p.is_match("https://app.grabdocs.com/files"));
        assert!(!p.is_match("https://app.grabdocs.com/files?from=/login"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(matches!(
            UrlPattern::new("(unclosed"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_signal_labels() {
        let outcome = Outcome::new()
            .visible("[data-testid=\"toast-success\"]")
            .body_contains("sample")
            .url_matches(UrlPattern::dashboard_or_upload());
        let labels: Vec<String> = outcome.signals().iter().map(Signal::label).collect();
        assert_eq!(
            labels,
            vec![
                "visible [data-testid=\"toast-success\"]",
                "page text contains 'sample'",
                "url matches /^/(dashboard|upload)(/|$)/",
            ]
        );
    }
}
