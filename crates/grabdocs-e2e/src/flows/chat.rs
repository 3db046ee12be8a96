// Chat with the document assistant on /upload, and export the conversation

use super::{FlowContext, FlowReport};
use crate::error::{Error, Result};
use crate::locator::{Candidates, KeywordScan, catalog};
use crate::outcome::Outcome;
use crate::surface::Target;
use std::time::Duration;

pub const CHAT_ROUTE: &str = "/upload";

/// Input types that never hold a chat message
const NON_TEXT_TYPES: [&str; 6] = ["hidden", "file", "button", "submit", "checkbox", "radio"];

pub fn chat_inputs() -> Candidates {
    Candidates::new(
        "chat input",
        [
            "input[placeholder*=\"Ask\" i]",
            "textarea[placeholder*=\"Ask\" i]",
            "input[placeholder*=\"message\" i]",
            "textarea[placeholder*=\"message\" i]",
            "input[placeholder*=\"chat\" i]",
            "textarea[placeholder*=\"chat\" i]",
            "input[placeholder*=\"Type\" i]",
            "textarea[placeholder*=\"Type\" i]",
            "input[type=\"text\"]",
            "textarea",
            "[contenteditable=\"true\"]",
            "[role=\"textbox\"]",
            "[contenteditable]",
        ],
    )
}

fn any_text_entry() -> KeywordScan {
    KeywordScan::new(["input", "textarea", "[contenteditable]"])
        .cap(30)
        .exclude_types(&NON_TEXT_TYPES)
}

fn response_areas() -> [&'static str; 6] {
    [
        "[class*=\"response\"]",
        "[class*=\"message\"]",
        "[class*=\"chat\"]",
        "[class*=\"ai\"]",
        "[class*=\"assistant\"]",
        "[class*=\"bot\"]",
    ]
}

/// First 10 characters, the part message bubbles reliably show
fn message_prefix(text: &str) -> String {
    text.chars().take(10).collect::<String>().replace('"', "")
}

async fn chat_input(ctx: &FlowContext<'_>) -> Result<Target> {
    match ctx
        .resolver
        .resolve_enabled(ctx.surface, &chat_inputs(), ctx.timings.control)
        .await
    {
        Ok(input) => Ok(input),
        Err(err) => match any_text_entry().find(ctx.surface, &ctx.resolver).await {
            Some(input) => Ok(input),
            None => Err(err.context("chat: no message input")),
        },
    }
}

/// Sends `text` and expects the message and a response area.
pub async fn send_message(ctx: &FlowContext<'_>, text: &str) -> Result<FlowReport> {
    ctx.open(CHAT_ROUTE).await?;
    let input = chat_input(ctx).await?;

    ctx.surface.click(&input, false).await?;
    ctx.surface.fill(&input, "").await?;
    ctx.pause(Duration::from_millis(500)).await;
    ctx.surface.fill(&input, text).await?;
    ctx.pause(Duration::from_millis(500)).await;
    ctx.surface.press(&input, "Enter").await?;
    tracing::info!("chat: message sent");
    ctx.pause(Duration::from_secs(5)).await;

    let sent = Outcome::new()
        .body_contains(text)
        .visible(format!(
            "[class*=\"message\"]:has-text(\"{}\")",
            message_prefix(text)
        ))
        .visible("[class*=\"user-message\"]");
    let signal = ctx.require(&sent, "chat message shown").await?;

    let response = Outcome::new().any_visible(response_areas());
    ctx.require(&response, "chat response area").await?;

    Ok(FlowReport::passed("chat", signal))
}

/// File types an exported conversation may arrive as
const EXPORT_EXTENSIONS: [&str; 7] = [".txt", ".pdf", ".json", ".csv", ".md", ".doc", ".docx"];

fn export_controls() -> Candidates {
    Candidates::new(
        "export control",
        [
            "button:has-text(\"Export\")",
            "button:has-text(\"Download\")",
            "button:has-text(\"Save\")",
            "[data-testid*=\"export\"]",
            "[data-testid*=\"download-chat\"]",
            "[data-testid*=\"export-chat\"]",
            "[aria-label*=\"export\" i]",
            "[aria-label*=\"download\" i]",
            "button[title*=\"export\" i]",
            "button[title*=\"download\" i]",
            "[class*=\"export\"]",
            "[class*=\"download-chat\"]",
            "svg[aria-label*=\"export\" i]",
            "svg[aria-label*=\"download\" i]",
        ],
    )
}

fn menu_buttons() -> [&'static str; 6] {
    [
        "[data-testid*=\"menu\"]",
        "[aria-label*=\"menu\" i]",
        "button[aria-haspopup=\"true\"]",
        "[class*=\"menu\"]",
        "[class*=\"kebab\"]",
        "[class*=\"more\"]",
    ]
}

pub fn is_export_filename(name: &str) -> bool {
    let lower = name.to_lowercase();
    EXPORT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

// Export control on the page, inside the chat area, or behind an overflow menu
async fn export_control(ctx: &FlowContext<'_>) -> Result<Option<Target>> {
    let controls = export_controls();
    if let Some(found) = ctx.resolver.try_resolve(ctx.surface, &controls, ctx.timings.control).await {
        return Ok(Some(found));
    }

    let areas = Candidates::new(
        "chat area",
        ["[class*=\"chat\"]", "[class*=\"message\"]", "[class*=\"conversation\"]"],
    );
    if let Some(area) = ctx.resolver.try_resolve(ctx.surface, &areas, Duration::from_secs(2)).await {
        if let Ok(found) = ctx.find(Some(&area), &controls, Duration::from_secs(1)).await {
            return Ok(Some(found));
        }
    }

    let option = Candidates::new("export menu option", [catalog::text_matching("export|download|save")]);
    for menu in menu_buttons() {
        let button = Target::main(menu).first();
        if !ctx.resolver.probe(ctx.surface, &button).await {
            continue;
        }
        ctx.surface.click(&button, false).await?;
        ctx.pause(Duration::from_millis(500)).await;
        if let Some(found) = ctx.resolver.try_resolve(ctx.surface, &option, Duration::from_secs(1)).await {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Sends `prompt`, then exports the conversation.
///
/// A download must carry a document-like extension; without a download an
/// export dialog counts. Skipped when the page has no export control.
pub async fn export_conversation(ctx: &FlowContext<'_>, prompt: &str) -> Result<FlowReport> {
    send_message(ctx, prompt).await?;

    let Some(control) = export_control(ctx).await? else {
        return Ok(FlowReport::skipped("export conversation", "no export control"));
    };
    match ctx
        .surface
        .click_expecting_download(&control, ctx.timings.download)
        .await?
    {
        Some(filename) if is_export_filename(&filename) => Ok(FlowReport::passed(
            "export conversation",
            format!("download {}", filename),
        )),
        Some(filename) => Err(Error::AssertionFailed(format!(
            "export conversation: unexpected file type '{}'",
            filename
        ))),
        None => {
            let dialog = Outcome::new()
                .any_visible(catalog::modal().selectors().iter().cloned())
                .visible(catalog::text_matching("export|download|save"));
            let signal = ctx.require(&dialog, "export dialog").await?;
            Ok(FlowReport::passed("export conversation", signal))
        }
    }
}
