// Transport and routing checks: HTTPS, secrets in the URL, unknown routes

use super::{FlowContext, FlowReport};
use crate::error::{Error, Result};
use crate::locator::catalog;
use crate::outcome::Outcome;
use std::time::Duration;
use url::Url;

/// A route no deployment serves
pub const UNKNOWN_ROUTE: &str = "/this-page-does-not-exist-12345-xyz";

const SENSITIVE_KEYS: [&str; 5] = ["password", "token", "secret", "api_key", "session"];

/// Home-like routes an unknown URL may redirect to
const HOME_ROUTES: [&str; 3] = ["/login", "/dashboard", "/upload"];

/// Whether the URL names a credential anywhere (path, query or fragment).
pub fn url_has_sensitive_data(url: &str) -> bool {
    let lower = url.to_lowercase();
    SENSITIVE_KEYS.iter().any(|key| lower.contains(key))
}

/// How the app answered a request for an unknown route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownRoute {
    /// A not-found page was rendered
    NotFoundPage,
    /// The browser ended up on a home-like route
    Redirected,
    /// Still on the unknown path with nothing saying so
    Unhandled,
}

/// Classifies the final state after opening [`UNKNOWN_ROUTE`].
pub fn classify_unknown_route(final_url: &str, not_found_shown: bool) -> UnknownRoute {
    let still_on_route = final_url.contains(UNKNOWN_ROUTE);
    if not_found_shown && (still_on_route || final_url.contains("404")) {
        return UnknownRoute::NotFoundPage;
    }
    let on_home = HOME_ROUTES.iter().any(|route| final_url.contains(route));
    if on_home || !still_on_route {
        UnknownRoute::Redirected
    } else {
        UnknownRoute::Unhandled
    }
}

/// The login page must be served over HTTPS.
pub async fn uses_https(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    ctx.open("/login").await?;
    let current = ctx.surface.url();
    let scheme = Url::parse(&current)
        .map(|u| u.scheme().to_string())
        .unwrap_or_default();
    if scheme != "https" {
        return Err(Error::AssertionFailed(format!(
            "https: page served over '{}' ({})",
            scheme, current
        )));
    }
    Ok(FlowReport::passed("https", current))
}

/// The current URL must not carry credentials.
pub async fn no_sensitive_data_in_url(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    let current = ctx.surface.url();
    if url_has_sensitive_data(&current) {
        return Err(Error::AssertionFailed(format!(
            "sensitive data in URL: {}",
            current
        )));
    }
    Ok(FlowReport::passed("no sensitive data in url", current))
}

/// An unknown route shows a not-found page or redirects home.
pub async fn unknown_route_handled(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    let status = ctx.open(UNKNOWN_ROUTE).await?;
    tracing::info!("unknown route: status {:?}", status);

    let not_found = Outcome::new()
        .visible(catalog::text_matching("404|not found|page not found|error 404"))
        .any_visible([
            "[class*=\"404\"]",
            "[class*=\"not-found\"]",
            "[class*=\"error-404\"]",
            "h1:has-text(\"404\")",
            "h2:has-text(\"404\")",
        ]);
    let seen = not_found
        .any(ctx.surface, &ctx.resolver, Duration::from_secs(3))
        .await;

    let final_url = ctx.surface.url();
    match classify_unknown_route(&final_url, seen.is_some() || status == Some(404)) {
        UnknownRoute::NotFoundPage => Ok(FlowReport::passed(
            "unknown route",
            seen.unwrap_or_else(|| "HTTP 404".to_string()),
        )),
        UnknownRoute::Redirected => Ok(FlowReport::passed(
            "unknown route",
            format!("redirected to {}", final_url),
        )),
        UnknownRoute::Unhandled => Err(Error::AssertionFailed(format!(
            "unknown route: no not-found page and no redirect (at '{}')",
            final_url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_url_detection() {
        assert!(url_has_sensitive_data("https://app.grabdocs.com/reset?token=abc"));
        assert!(url_has_sensitive_data("https://app.grabdocs.com/x#API_KEY=1"));
        assert!(!url_has_sensitive_data("https://app.grabdocs.com/upload"));
    }

    #[test]
    fn test_classify_unknown_route() {
        let base = "https://app.grabdocs.com";
        let unknown = format!("{}{}", base, UNKNOWN_ROUTE);
        assert_eq!(classify_unknown_route(&unknown, true), UnknownRoute::NotFoundPage);
        assert_eq!(classify_unknown_route(&unknown, false), UnknownRoute::Unhandled);
        assert_eq!(
            classify_unknown_route(&format!("{}/login", base), false),
            UnknownRoute::Redirected
        );
        assert_eq!(
            classify_unknown_route(&format!("{}/", base), false),
            UnknownRoute::Redirected
        );
        assert_eq!(
            classify_unknown_route(&format!("{}/404", base), true),
            UnknownRoute::NotFoundPage
        );
    }
}
