// Analytics dashboard on /analysis: view the data, export it

use super::{FlowContext, FlowReport};
use crate::error::Result;
use crate::locator::{Candidates, catalog};
use crate::outcome::{Outcome, wait_until_gone};
use std::time::Duration;

pub const ANALYTICS_ROUTE: &str = "/analysis";

/// The dashboard keeps polling; this is how long its spinner may stay up
const LOADING_BUDGET: Duration = Duration::from_secs(10);

/// Render time after the spinner has gone
const RENDER: Duration = Duration::from_secs(5);

fn data_views() -> [&'static str; 10] {
    [
        "[class*=\"chart\"]",
        "[class*=\"graph\"]",
        "[class*=\"metric\"]",
        "[data-testid*=\"chart\"]",
        "canvas",
        "svg",
        "table",
        "[class*=\"analytics\"]",
        "[class*=\"dashboard\"]",
        "[class*=\"stat\"]",
    ]
}

fn export_buttons() -> Candidates {
    Candidates::new(
        "export button",
        [
            "button:has-text(\"Export\")",
            "button:has-text(\"Download\")",
            "[data-testid*=\"export\"]",
            "a:has-text(\"Export\")",
        ],
    )
}

async fn load(ctx: &FlowContext<'_>) -> Result<()> {
    ctx.open(ANALYTICS_ROUTE).await?;
    let spinner = Candidates::new(
        "analytics loading indicator",
        [catalog::text_matching("loading.*analytics")],
    );
    if !wait_until_gone(ctx.surface, &ctx.resolver, &spinner, LOADING_BUDGET).await {
        tracing::warn!("analytics: still loading after {:?}", LOADING_BUDGET);
    }
    ctx.pause(RENDER).await;
    Ok(())
}

/// Expects charts, metrics, or at least some rendered content.
pub async fn view(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    load(ctx).await?;
    let outcome = Outcome::new()
        .any_visible(data_views())
        .visible("[class*=\"number\"]")
        .body_longer_than(100);
    let signal = ctx.require(&outcome, "analytics data").await?;
    Ok(FlowReport::passed("view analytics", signal))
}

/// Clicks Export and expects a download or an export dialog.
///
/// Skipped when the page has no export control.
pub async fn export(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    load(ctx).await?;
    let Some(button) = ctx
        .resolver
        .try_resolve(ctx.surface, &export_buttons(), Duration::from_secs(2))
        .await
    else {
        return Ok(FlowReport::skipped("export analytics", "no export control"));
    };

    if let Some(filename) = ctx
        .surface
        .click_expecting_download(&button, ctx.timings.download)
        .await?
    {
        tracing::info!("analytics: exported {}", filename);
        return Ok(FlowReport::passed("export analytics", format!("download {}", filename)));
    }

    let dialog = Outcome::new().visible("[role=\"dialog\"]");
    let signal = dialog
        .require(ctx.surface, &ctx.resolver, Duration::from_secs(3), "export download or dialog")
        .await?;
    Ok(FlowReport::passed("export analytics", signal))
}
