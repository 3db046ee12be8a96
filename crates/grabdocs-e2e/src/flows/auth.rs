// Authentication scenarios that run after (or instead of) the fixture login

use super::{FlowContext, FlowReport};
use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::locator::catalog;
use crate::outcome::{Outcome, UrlPattern, wait_for_url};
use crate::session::SessionEstablisher;
use std::time::Duration;

/// Submits bad credentials and expects an error while staying on the login page.
pub async fn invalid_login_shows_error(
    ctx: &FlowContext<'_>,
    establisher: &SessionEstablisher,
    credentials: &Credentials,
) -> Result<FlowReport> {
    let path = establisher.navigate_to_login(ctx.surface).await?;
    let form_url = ctx.surface.url();
    establisher.fill_login_form(ctx.surface, credentials).await?;

    let error = Outcome::new().any_visible(catalog::login_error().selectors().iter().cloned());
    let signal = ctx.require(&error, "invalid login error").await?;

    let url = ctx.surface.url();
    if !UrlPattern::login_surface().is_match(&url) && url != form_url {
        return Err(Error::AssertionFailed(format!(
            "invalid login left the login page ({} -> {})",
            path, url
        )));
    }
    Ok(FlowReport::passed("invalid login", signal))
}

/// Clicks logout and expects a login route; skipped when there is no logout control.
pub async fn logout(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    let Some(control) = ctx
        .resolver
        .try_resolve(ctx.surface, &catalog::logout(), Duration::ZERO)
        .await
    else {
        return Ok(FlowReport::skipped("logout", "no logout control on this page"));
    };

    ctx.surface.click(&control, false).await?;
    let login = UrlPattern::login_surface();
    if wait_for_url(ctx.surface, &login, ctx.timings.verify, ctx.resolver.per_check()).await {
        Ok(FlowReport::passed(
            "logout",
            format!("url matches /{}/", login.as_str()),
        ))
    } else {
        Err(Error::AssertionFailed(format!(
            "logout did not reach a login route (at '{}')",
            ctx.surface.url()
        )))
    }
}

/// Reloads an authenticated page and checks the session holds.
pub async fn session_survives_reload(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    ctx.surface.reload().await?;
    let url = ctx.surface.url();
    if UrlPattern::login_surface().is_match(&url) {
        return Err(Error::AssertionFailed(format!(
            "reload dropped the session (at '{}')",
            url
        )));
    }
    Ok(FlowReport::passed("session persistence", url))
}
