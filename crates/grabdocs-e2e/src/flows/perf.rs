// Page load timing from the Navigation Timing API

use super::FlowContext;
use crate::error::Result;
use serde::{Deserialize, Serialize};

const NAVIGATION_TIMING: &str = r#"(() => {
  const t = performance.timing;
  const nav = performance.getEntriesByType('navigation')[0];
  const paint = (name) => {
    const entry = performance.getEntriesByName(name)[0];
    return entry ? entry.startTime : null;
  };
  return {
    loadTime: t.loadEventEnd - t.navigationStart,
    domContentLoaded: t.domContentLoadedEventEnd - t.navigationStart,
    firstPaint: paint('first-paint') ?? (nav ? nav.fetchStart : null),
    firstContentfulPaint: paint('first-contentful-paint') ?? (nav ? nav.domContentLoadedEventStart : null),
  };
})()"#;

/// Milliseconds from navigation start. Paint timings are absent when the
/// browser does not report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoadMetrics {
    pub load_time: f64,
    pub dom_content_loaded: f64,
    #[serde(default)]
    pub first_paint: Option<f64>,
    #[serde(default)]
    pub first_contentful_paint: Option<f64>,
}

impl PageLoadMetrics {
    /// The load event has not fired yet when `loadEventEnd` is still zero
    pub fn load_completed(&self) -> bool {
        self.load_time > 0.0
    }
}

/// Opens `route` and reads its load timings.
pub async fn measure_page_load(ctx: &FlowContext<'_>, route: &str) -> Result<PageLoadMetrics> {
    ctx.open(route).await?;
    let value = ctx.surface.evaluate(NAVIGATION_TIMING).await?;
    let metrics: PageLoadMetrics = serde_json::from_value(value)?;
    tracing::info!(
        "{}: load {}ms, DOMContentLoaded {}ms",
        route,
        metrics.load_time,
        metrics.dom_content_loaded
    );
    Ok(metrics)
}
