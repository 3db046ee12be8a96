// Workspaces: create a workspace

use super::{CreateAndVerify, FieldFill, FlowContext, FlowReport, error_text, success_signals};
use crate::error::Result;
use crate::locator::{Candidates, catalog};
use crate::outcome::Outcome;

pub const WORKSPACES_ROUTE: &str = "/workspaces";

fn create_buttons() -> Candidates {
    Candidates::new(
        "create workspace button",
        [
            "button:has-text(\"Create Workspace\")",
            "button:has-text(\"Create\")",
            "button:has-text(\"New Workspace\")",
            "button:has-text(\"Add Workspace\")",
            "[data-testid*=\"create-workspace\"]",
            "[data-testid*=\"create\"]",
            "[aria-label*=\"create workspace\" i]",
        ],
    )
}

fn name_inputs() -> Candidates {
    Candidates::new(
        "workspace name field",
        [
            "input[name*=\"name\"]",
            "input[name*=\"workspace\"]",
            "input[placeholder*=\"name\" i]",
            "input[placeholder*=\"workspace\" i]",
            "input[type=\"text\"]",
        ],
    )
}

fn description_inputs() -> Candidates {
    Candidates::new(
        "workspace description field",
        [
            "textarea[name*=\"description\"]",
            "textarea[placeholder*=\"description\" i]",
            "textarea",
        ],
    )
}

fn save_buttons() -> Candidates {
    Candidates::new(
        "save workspace button",
        [
            "button:has-text(\"Create Workspace\")",
            "button:has-text(\"Create\")",
            "button:has-text(\"Save\")",
            "button[type=\"submit\"]",
            "[data-testid*=\"create\"]",
            "[data-testid*=\"save\"]",
        ],
    )
}

/// The create-workspace flow for `name`
pub fn create_workspace_flow(name: &str) -> CreateAndVerify {
    CreateAndVerify::new("create workspace", WORKSPACES_ROUTE)
        .open_with(create_buttons(), None)
        .field(FieldFill::required(name_inputs(), name))
        .field(FieldFill::optional(
            description_inputs(),
            "Test workspace description",
        ))
        .submit_with(save_buttons(), &[])
        .accept_toast(
            Outcome::new()
                .visible(catalog::text_matching(
                    "created|success|saved|workspace.*created",
                ))
                .any_visible(success_signals()),
        )
        .revisit_before_verify()
        .verify_with(
            Outcome::new()
                .body_contains(name)
                .visible("[class*=\"workspace\"]:has-text(\"workspace\")")
                .visible("[data-testid*=\"workspace\"]"),
        )
        .fail_on(error_text())
}

/// Creates a workspace and expects it listed.
pub async fn create_workspace(ctx: &FlowContext<'_>, name: &str) -> Result<FlowReport> {
    create_workspace_flow(name).run(ctx).await
}
