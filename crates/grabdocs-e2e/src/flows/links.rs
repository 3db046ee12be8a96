// Quick links: create a link

use super::{CreateAndVerify, FieldFill, FlowContext, FlowReport, error_text, success_signals};
use crate::error::Result;
use crate::locator::{Candidates, catalog};
use crate::outcome::Outcome;

pub const LINKS_ROUTE: &str = "/quick-links";

fn create_buttons() -> Candidates {
    Candidates::new(
        "create link button",
        [
            "button:has-text(\"Create Link\")",
            "button:has-text(\"New Link\")",
            "button:has-text(\"Add Link\")",
            "button:has-text(\"Create\")",
            "[data-testid*=\"create-link\"]",
            "[data-testid*=\"new-link\"]",
            "[aria-label*=\"create link\" i]",
        ],
    )
}

fn url_inputs() -> Candidates {
    Candidates::new(
        "link url field",
        [
            "input[name*=\"url\"]",
            "input[name*=\"link\"]",
            "input[type=\"url\"]",
            "input[placeholder*=\"url\" i]",
            "input[placeholder*=\"link\" i]",
            "input[placeholder*=\"https://\" i]",
            "input[type=\"text\"]",
        ],
    )
}

fn title_inputs() -> Candidates {
    Candidates::new(
        "link title field",
        [
            "input[name*=\"title\"]",
            "input[name*=\"name\"]",
            "input[placeholder*=\"title\" i]",
            "input[placeholder*=\"name\" i]",
        ],
    )
}

fn save_buttons() -> Candidates {
    Candidates::new(
        "save link button",
        [
            "button:has-text(\"Create Link\")",
            "button:has-text(\"Create\")",
            "button:has-text(\"Save\")",
            "button:has-text(\"Save Link\")",
            "button[type=\"submit\"]",
            "[data-testid*=\"create\"]",
            "[data-testid*=\"save\"]",
        ],
    )
}

/// The create-link flow for `title` pointing at `url`
pub fn create_link_flow(title: &str, url: &str) -> CreateAndVerify {
    CreateAndVerify::new("create link", LINKS_ROUTE)
        .open_with(create_buttons(), None)
        .field(FieldFill::required(url_inputs(), url))
        .field(FieldFill::optional(title_inputs(), title))
        .submit_with(save_buttons(), &[])
        .accept_toast(
            Outcome::new()
                .visible(catalog::text_matching("created|success|saved|link.*created"))
                .any_visible(success_signals()),
        )
        .revisit_before_verify()
        .verify_with(
            Outcome::new()
                .body_contains(title)
                .body_contains(url)
                .visible("[class*=\"link\"]:has-text(\"link\")"),
        )
        .fail_on(error_text())
}

/// Creates a quick link and expects it listed.
pub async fn create_link(ctx: &FlowContext<'_>, title: &str, url: &str) -> Result<FlowReport> {
    create_link_flow(title, url).run(ctx).await
}
