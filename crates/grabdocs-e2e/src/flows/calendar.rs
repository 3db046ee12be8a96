// Calendar: view the grid, create an event

use super::{CreateAndVerify, FieldFill, FlowContext, FlowReport, error_text, success_text};
use crate::error::Result;
use crate::locator::{Candidates, KeywordRule, KeywordScan};
use crate::outcome::Outcome;

pub const CALENDAR_ROUTE: &str = "/calendar";

const DATE_CELLS: [&str; 3] = ["td", "[role=\"gridcell\"]", "[class*=\"day\"]"];

/// Date cells inspected when there is no new-event button
const DATE_CELL_CAP: usize = 40;

fn calendar_views() -> [&'static str; 6] {
    [
        "[data-testid*=\"calendar\"]",
        "[class*=\"calendar\"]",
        "[class*=\"calendar-grid\"]",
        "[class*=\"calendar-view\"]",
        "table[class*=\"calendar\"]",
        "[role=\"grid\"]",
    ]
}

fn new_event_buttons() -> Candidates {
    Candidates::new(
        "new event button",
        [
            "button:has-text(\"+ New Event\")",
            "button:has-text(\"New Event\")",
            "button:has-text(\"Create Event\")",
            "[data-testid*=\"new-event\"]",
            "[data-testid*=\"create-event\"]",
            "button:has-text(\"Add\")",
        ],
    )
}

fn title_inputs() -> Candidates {
    Candidates::new(
        "event title field",
        [
            "input[placeholder*=\"Team Meeting\" i]",
            "input[placeholder*=\"Event Title\" i]",
            "input[placeholder*=\"title\" i]",
            "input[name*=\"title\"]",
            "input[name*=\"eventTitle\"]",
            "input[type=\"text\"]",
        ],
    )
}

/// Expects a calendar grid or at least one date cell.
pub async fn view(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    ctx.open(CALENDAR_ROUTE).await?;
    let outcome = Outcome::new()
        .any_visible(calendar_views())
        .any_visible(DATE_CELLS);
    let signal = ctx.require(&outcome, "calendar view").await?;
    Ok(FlowReport::passed("view calendar", signal))
}

/// The create-event flow for `title`
pub fn create_event_flow(title: &str) -> CreateAndVerify {
    let day_cells = KeywordScan::new(DATE_CELLS)
        .rule(KeywordRule::PositiveNumber)
        .cap(DATE_CELL_CAP);

    CreateAndVerify::new("create event", CALENDAR_ROUTE)
        .open_with(new_event_buttons(), Some(day_cells))
        .force_scanned_click()
        .field(FieldFill::required(title_inputs(), title))
        .field(FieldFill::optional(
            Candidates::new("event description", ["textarea"]),
            "Test event description",
        ))
        .submit_with(
            Candidates::new(
                "create event button",
                [
                    "button:has-text(\"Create Event\")",
                    "button:has-text(\"Create\")",
                    "button:has-text(\"Save\")",
                    "button[type=\"submit\"]",
                ],
            ),
            &["create", "save"],
        )
        .reload_before_verify()
        .verify_with(
            Outcome::new()
                .body_contains(title)
                .visible(success_text("Test Event"))
                .visible("[data-testid*=\"event\"]:has-text(\"Test Event\")")
                .visible(success_text("created|success|saved")),
        )
        .fail_on(error_text())
}

/// Creates an event titled `title` and expects it after a reload.
pub async fn create_event(ctx: &FlowContext<'_>, title: &str) -> Result<FlowReport> {
    create_event_flow(title).run(ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Signal;

    #[test]
    fn test_create_event_flow_shape() {
        let flow = create_event_flow("Test Event 1");
        assert!(flow.force_scanned_click);
        assert_eq!(flow.open_scan.as_ref().map(KeywordScan::max_elements), Some(40));
        assert!(flow.fields[0].required);
        assert!(!flow.fields[1].required);
        assert_eq!(flow.refresh, crate::flows::Refresh::Reload);
        assert!(matches!(
            &flow.verify.signals()[0],
            Signal::BodyContains(t) if t == "Test Event 1"
        ));
    }
}
