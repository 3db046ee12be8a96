// Forms: create a form from a template and save it

use super::{FlowContext, FlowReport, success_signals};
use crate::error::{Error, Result};
use crate::locator::{Candidates, KeywordScan, catalog};
use crate::outcome::Outcome;
use crate::surface::Target;
use std::time::Duration;

pub const FORMS_ROUTE: &str = "/forms";

/// Labels that belong to page chrome, never to a template
const NOT_A_TEMPLATE: [&str; 7] = [
    "create", "cancel", "close", "delete", "new link", "home", "dashboard",
];

const BUILDER_LOAD: Duration = Duration::from_secs(3);

fn template_scans(preferred: Option<&str>) -> Vec<KeywordScan> {
    let scans = vec![
        KeywordScan::new([
            "[class*=\"template\"]",
            "[data-testid*=\"template\"]",
            "[class*=\"form-template\"]",
            "[class*=\"template-card\"]",
            "[class*=\"template-item\"]",
            "button[class*=\"template\"]",
            "a[class*=\"template\"]",
        ])
        .cap(20),
        KeywordScan::new([
            "div[class*=\"grid\"] > div",
            "div[class*=\"grid\"] > button",
            "div[class*=\"grid\"] > a",
        ]),
        KeywordScan::new(["div[class*=\"card\"]", "button", "[role=\"button\"]", "a[href]"]),
    ];
    scans
        .into_iter()
        .map(|scan| {
            let scan = scan.exclude_keywords(&NOT_A_TEMPLATE);
            match preferred {
                Some(name) => scan.keywords(&[name]),
                None => scan,
            }
        })
        .collect()
}

fn save_icons() -> Candidates {
    Candidates::new(
        "save icon",
        [
            "svg[aria-label*=\"save\" i]",
            "button svg[aria-label*=\"save\" i]",
            "[data-testid*=\"save\"]",
            "button[aria-label*=\"save\" i]",
            "button[title*=\"save\" i]",
            "button:has(svg[aria-label*=\"save\" i])",
            "button:has(svg[class*=\"save\" i])",
            "[class*=\"save-icon\"]",
            "[class*=\"icon-save\"]",
        ],
    )
}

fn save_buttons() -> Candidates {
    Candidates::new(
        "save button",
        [
            "button:has-text(\"Save Form\")",
            "button:has-text(\"Save\")",
            "button:has-text(\"Create\")",
            "button[type=\"submit\"]",
        ],
    )
}

async fn pick_template(ctx: &FlowContext<'_>, preferred: Option<&str>) -> Option<Target> {
    for scan in template_scans(preferred) {
        if let Some(found) = scan.find(ctx.surface, &ctx.resolver).await {
            return Some(found);
        }
    }
    None
}

async fn save_control(ctx: &FlowContext<'_>, scope: Option<&Target>) -> Result<Target> {
    if let Ok(icon) = ctx.find(scope, &save_icons(), Duration::from_secs(2)).await {
        return Ok(icon);
    }
    let icon_buttons = KeywordScan::new(["button:has(svg)", "button:has([class*=\"icon\"])"])
        .keywords(&["save"]);
    let text_buttons = save_buttons();
    let any_button = KeywordScan::new(["button", "[role=\"button\"]"])
        .keywords(&["save"])
        .cap(50);

    if let Ok(found) = ctx.find_or_scan(scope, &text_buttons, Some(&icon_buttons)).await {
        return Ok(found);
    }
    any_button
        .find(ctx.surface, &ctx.resolver)
        .await
        .ok_or_else(|| Error::NotFound {
            intent: "form save control".to_string(),
            tried: save_icons()
                .selectors()
                .iter()
                .chain(text_buttons.selectors())
                .cloned()
                .collect(),
            url: ctx.surface.url(),
            last_error: "no visible control labelled save".to_string(),
        })
}

/// Opens a template (the one labelled `preferred`, else the first), saves the
/// form and expects it in the forms list.
pub async fn create_from_template(
    ctx: &FlowContext<'_>,
    preferred: Option<&str>,
) -> Result<FlowReport> {
    ctx.open(FORMS_ROUTE).await?;

    let template = pick_template(ctx, preferred).await.ok_or_else(|| Error::NotFound {
        intent: "form template".to_string(),
        tried: vec!["[class*=\"template\"]".to_string(), "div[class*=\"grid\"] > *".to_string()],
        url: ctx.surface.url(),
        last_error: "no visible template".to_string(),
    })?;
    ctx.click_lenient(&template).await?;
    ctx.pause(BUILDER_LOAD).await;

    let scope = ctx.modal_scope().await;
    let save = save_control(ctx, scope.as_ref()).await?;
    ctx.click_lenient(&save).await?;
    tracing::info!("forms: save clicked");
    ctx.pause(BUILDER_LOAD).await;

    let toast = Outcome::new()
        .visible(catalog::text_matching("saved|success|created|form.*saved"))
        .any_visible(success_signals());
    let toast_seen = toast.any(ctx.surface, &ctx.resolver, Duration::from_secs(5)).await;

    ctx.open(FORMS_ROUTE).await?;
    ctx.reload().await?;

    let listed = Outcome::new()
        .any_visible(
            [
                "[class*=\"form\"]",
                "[data-testid*=\"form\"]",
                "[class*=\"list-item\"]",
            ]
            .map(|root| format!("{}:has-text(\"form\")", root)),
        )
        .body_contains("saved");
    let signal = match toast_seen {
        Some(signal) => signal,
        None => ctx.require(&listed, "saved form").await?,
    };

    let errors = Candidates::new("form error", [catalog::text_matching("error|failed|invalid")]);
    if let Some(text) = ctx.visible_error(&errors).await {
        return Err(Error::AssertionFailed(format!(
            "forms: error shown after save: '{}'",
            text
        )));
    }
    Ok(FlowReport::passed("create form", signal))
}
