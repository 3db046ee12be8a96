// Document flows on /files: upload, search, preview, download, send, rename, delete

use super::{FlowContext, FlowReport};
use crate::error::{Error, Result};
use crate::locator::{Candidates, KeywordScan, catalog};
use crate::outcome::{Outcome, UrlPattern};
use crate::surface::Target;
use std::path::Path;
use std::time::Duration;

pub const FILES_ROUTE: &str = "/files";

/// Search term that matches no document
pub const NO_MATCH_TERM: &str = "nonexistentdocument12345xyz";

const FILE_INPUT: &str = "input[type=\"file\"]";
const LIST_SETTLE: Duration = Duration::from_secs(2);

fn upload_controls() -> Candidates {
    Candidates::new(
        "upload control",
        [
            FILE_INPUT,
            "[data-testid=\"upload-btn\"]",
            "[data-testid*=\"upload\"]",
            "[class*=\"upload\"]",
            "button:has-text(\"Upload\")",
            "button:has-text(\"Choose file\")",
        ],
    )
}

fn document_cards() -> Vec<String> {
    [
        "[data-testid=\"doc-card\"]",
        "[data-testid*=\"document\"]",
        "[data-testid*=\"file\"]",
        "[class*=\"document\"]",
        "[class*=\"file-card\"]",
        "[class*=\"doc-card\"]",
        "a[href*=\"/files/\"]",
        "a[href*=\"/document/\"]",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn document_rows() -> Candidates {
    Candidates::new(
        "document row",
        [
            "[data-testid=\"doc-card\"]",
            "[data-testid*=\"file\"]",
            "[data-testid*=\"document\"]",
            "[class*=\"document\"]",
            "[class*=\"file-card\"]",
            "[class*=\"doc-card\"]",
            "[role=\"listitem\"]",
            "tr",
            "tbody tr",
            "table tbody tr",
            "[class*=\"row\"]",
            "div[class*=\"item\"]",
        ],
    )
}

fn search_inputs() -> Candidates {
    Candidates::new(
        "search input",
        [
            "[data-testid*=\"search\"]",
            "input[placeholder*=\"search\" i]",
            "input[placeholder*=\"file\" i]",
            "input[placeholder*=\"document\" i]",
            "input[type=\"search\"]",
            "input[type=\"text\"][placeholder]",
            "input[aria-label*=\"search\" i]",
            "[data-testid=\"search-input\"]",
        ],
    )
}

fn open_buttons() -> Candidates {
    Candidates::new(
        "open button",
        [
            "button[title=\"Open file\"]".to_string(),
            "button[title*=\"open file\" i]".to_string(),
            "button[title*=\"open\" i]".to_string(),
            "button:has-text(\"Open\")".to_string(),
            "[aria-label*=\"open\" i]".to_string(),
            "[data-testid*=\"open\"]".to_string(),
            catalog::role_button("open"),
        ],
    )
}

fn viewers() -> Vec<String> {
    [
        "[data-testid=\"viewer\"]",
        "iframe",
        "canvas",
        "[class*=\"viewer\"]",
        "[class*=\"preview\"]",
        "[data-testid*=\"viewer\"]",
        "[data-testid*=\"preview\"]",
        "embed",
        "object",
        "[role=\"dialog\"]",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// File name without its extension, lower-cased
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

// Playwright quotes in :has-text() cannot be escaped, so they are dropped.
fn has_text(selector: &str, text: &str) -> String {
    format!("{}:has-text(\"{}\")", selector, text.replace('"', ""))
}

/// Uploads `path` and expects it in the document list after a reload.
pub async fn upload(ctx: &FlowContext<'_>, path: &Path) -> Result<FlowReport> {
    let stem = file_stem(path);
    ctx.open(FILES_ROUTE).await?;

    match ctx.find(None, &upload_controls(), ctx.timings.control).await {
        Ok(control) => {
            let kind = ctx.surface.attribute(&control, "type").await.ok().flatten();
            if kind.as_deref() == Some("file") {
                ctx.surface.set_input_files(&control, path).await?;
            } else {
                ctx.surface.click(&control, false).await?;
                ctx.pause(Duration::from_millis(500)).await;
                ctx.surface
                    .set_input_files(&Target::main(FILE_INPUT).first(), path)
                    .await?;
            }
        }
        Err(e) => {
            // File inputs are often hidden behind a styled button
            tracing::debug!("No visible upload control ({}), using the file input directly", e);
            ctx.surface
                .set_input_files(&Target::main(FILE_INPUT).first(), path)
                .await
                .map_err(|err| err.context("upload: no file input on the page"))?;
        }
    }
    tracing::info!("upload: {} submitted", path.display());

    ctx.pause(ctx.timings.after_action * 2).await;
    ctx.reload().await?;

    let outcome = Outcome::new()
        .visible(catalog::text_matching(&regex::escape(&stem)))
        .any_visible(document_cards().iter().map(|card| has_text(card, &stem)))
        .body_contains(stem.clone());
    match ctx.require(&outcome, "uploaded file in document list").await {
        Ok(signal) => Ok(FlowReport::passed("upload", signal)),
        Err(miss) => {
            let errors = Candidates::new(
                "upload error",
                [catalog::text_matching("error|failed|invalid|rejected")],
            );
            match ctx.visible_error(&errors).await {
                Some(text) => Err(Error::AssertionFailed(format!(
                    "upload failed with error: '{}'",
                    text
                ))),
                None => Err(miss),
            }
        }
    }
}

async fn search_field(ctx: &FlowContext<'_>) -> Result<Target> {
    ctx.resolver
        .resolve_enabled(ctx.surface, &search_inputs(), ctx.timings.control)
        .await
}

async fn type_search(ctx: &FlowContext<'_>, field: &Target, term: &str) -> Result<()> {
    ctx.surface.click(field, false).await?;
    ctx.surface.fill(field, "").await?;
    ctx.pause(Duration::from_millis(300)).await;
    ctx.surface.fill(field, term).await?;
    ctx.pause(LIST_SETTLE).await;
    Ok(())
}

/// Types `term` into the search bar and expects a matching result.
pub async fn search(ctx: &FlowContext<'_>, term: &str) -> Result<FlowReport> {
    ctx.open(FILES_ROUTE).await?;
    let field = search_field(ctx).await?;
    type_search(ctx, &field, term).await?;

    let outcome = Outcome::new()
        .visible(catalog::text_matching(&regex::escape(term)))
        .any_visible(
            ["[class*=\"document\"]", "[class*=\"file\"]", "a", "[role=\"listitem\"]"]
                .map(|root| has_text(root, term)),
        );
    let signal = ctx.require(&outcome, "search result").await?;
    Ok(FlowReport::passed("search", signal))
}

/// Searches for `term` and accepts either an empty-state message or no results.
///
/// Never fails once the search bar is found; the report says which shape was seen.
pub async fn search_empty_state(ctx: &FlowContext<'_>, term: &str) -> Result<FlowReport> {
    ctx.open(FILES_ROUTE).await?;
    let Ok(field) = search_field(ctx).await else {
        return Ok(FlowReport::skipped("empty search", "no search bar"));
    };
    ctx.surface.fill(&field, term).await?;
    ctx.pause(Duration::from_secs(1)).await;

    let empty_state = Outcome::new()
        .visible(catalog::text_matching("no results|no documents|nothing found|empty"))
        .any_visible(["[class*=\"empty\"]", "[class*=\"no-results\"]"]);
    let signal = empty_state
        .any(ctx.surface, &ctx.resolver, LIST_SETTLE)
        .await
        .unwrap_or_else(|| "no matching results".to_string());
    Ok(FlowReport::passed("empty search", signal))
}

// The row holding the first document: the ancestor of a document-like
// text, else the first visible row-like element.
async fn first_document(ctx: &FlowContext<'_>) -> Result<Target> {
    let by_text = Target::main(catalog::text_matching("sample|pdf|document|file")).first();
    if ctx.resolver.probe(ctx.surface, &by_text).await {
        let row = by_text
            .within(
                "xpath=ancestor::tr[1] | ancestor::div[contains(@class,\"row\") or \
                 contains(@class,\"item\") or contains(@class,\"card\")][1]",
            )
            .first();
        if ctx.resolver.probe(ctx.surface, &row).await {
            return Ok(row);
        }
        return Ok(by_text);
    }
    ctx.find(None, &document_rows(), ctx.timings.control)
        .await
        .map_err(|e| e.context("files: no document on the files page"))
}

/// Opens the first document and expects a viewer, a document route or document content.
pub async fn preview_first_document(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    ctx.open(FILES_ROUTE).await?;
    ctx.pause(LIST_SETTLE).await;
    let row = first_document(ctx).await?;

    let scan = KeywordScan::new(["button"]).keywords(&["open"]);
    let open = match ctx.find_or_scan(Some(&row), &open_buttons(), Some(&scan)).await {
        Ok(button) => button,
        Err(_) => ctx
            .find(None, &Candidates::new("open button", [catalog::role_button("open")]), ctx.timings.control)
            .await
            .map_err(|e| e.context("preview: no Open button"))?,
    };
    ctx.surface.click(&open, false).await?;
    ctx.pause(LIST_SETTLE).await;

    let outcome = Outcome::new()
        .url_matches(UrlPattern::path(r"/(document|preview|view|files/[^/]+)")?)
        .any_visible(viewers())
        .body_longer_than(1000)
        .body_contains("pdf");
    let signal = ctx.require(&outcome, "document preview").await?;
    Ok(FlowReport::passed("preview", signal))
}

/// Opens the first document and expects a download from its download control.
pub async fn download_first_document(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    ctx.open(FILES_ROUTE).await?;
    let card = Target::main("[data-testid=\"doc-card\"]").first();
    let by_text = Target::main(catalog::text_matching("sample")).first();
    if ctx.resolver.probe(ctx.surface, &card).await {
        ctx.surface.click(&card, false).await?;
    } else if ctx.resolver.probe(ctx.surface, &by_text).await {
        ctx.surface.click(&by_text, true).await?;
    }
    ctx.pause(LIST_SETTLE).await;

    let controls = Candidates::new(
        "download control",
        [
            "[data-testid=\"download\"]".to_string(),
            catalog::text_matching("download"),
        ],
    );
    let Some(control) = ctx
        .resolver
        .try_resolve(ctx.surface, &controls, ctx.timings.control)
        .await
    else {
        return Ok(FlowReport::skipped("download", "no download control"));
    };

    match ctx
        .surface
        .click_expecting_download(&control, ctx.timings.download)
        .await?
    {
        Some(filename) => Ok(FlowReport::passed("download", format!("download {}", filename))),
        None => Err(Error::AssertionFailed(format!(
            "download: no download started within {:?}",
            ctx.timings.download
        ))),
    }
}

fn row_action(label: &str, testid: &str) -> Candidates {
    let lower = label.to_lowercase();
    Candidates::new(
        format!("{} control", lower),
        [
            format!("button:has-text(\"{}\")", label),
            format!("button[title*=\"{}\" i]", lower),
            format!("[aria-label*=\"{}\" i]", lower),
            format!("[data-testid*=\"{}\"]", testid),
        ],
    )
}

// The action control in the first document row, else anywhere on the page
async fn document_action(ctx: &FlowContext<'_>, action: &Candidates) -> Result<Option<Target>> {
    ctx.open(FILES_ROUTE).await?;
    ctx.pause(LIST_SETTLE).await;
    let row = first_document(ctx).await?;
    Ok(ctx.find_near(Some(&row), action, None).await.ok())
}

/// Closes whatever dialog is open: its close button, else Escape up to three times.
pub async fn close_modal(ctx: &FlowContext<'_>) -> Result<()> {
    let close = Candidates::new(
        "close button",
        [
            "button:has-text(\"Close\")",
            "button[aria-label*=\"close\" i]",
            "button[aria-label*=\"cancel\" i]",
        ],
    );
    if let Some(button) = ctx.resolver.try_resolve(ctx.surface, &close, Duration::from_secs(1)).await {
        ctx.click_lenient(&button).await?;
        ctx.pause(Duration::from_millis(500)).await;
    }
    for _ in 0..3 {
        if ctx.modal_scope().await.is_none() {
            break;
        }
        ctx.surface.press_key("Escape").await?;
        ctx.pause(Duration::from_millis(500)).await;
    }
    Ok(())
}

/// Opens the first document's send dialog and expects a share link or dialog.
///
/// Skipped when the document has no send control.
pub async fn send_first_document(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    let Some(send) = document_action(ctx, &row_action("Send", "send")).await? else {
        return Ok(FlowReport::skipped("send document", "no send control"));
    };
    ctx.click_lenient(&send).await?;
    ctx.pause(LIST_SETTLE).await;

    let outcome = Outcome::new()
        .visible("input[value*=\"http\"]")
        .visible("[role=\"dialog\"]")
        .visible(catalog::text_matching("link|share|copy"));
    let signal = ctx.require(&outcome, "send dialog").await?;
    close_modal(ctx).await?;
    Ok(FlowReport::passed("send document", signal))
}

/// Renames the first document to `new_name` and expects the new name after a reload.
///
/// Skipped when the document has no rename control.
pub async fn rename_first_document(ctx: &FlowContext<'_>, new_name: &str) -> Result<FlowReport> {
    let Some(rename) = document_action(ctx, &row_action("Rename", "rename")).await? else {
        return Ok(FlowReport::skipped("rename document", "no rename control"));
    };
    ctx.click_lenient(&rename).await?;
    ctx.pause(Duration::from_secs(1)).await;

    let scope = ctx.modal_scope().await;
    let field = ctx
        .find(
            scope.as_ref(),
            &Candidates::new(
                "new name field",
                ["input[value*=\"sample\"]", "input[value*=\"pdf\"]", "input[type=\"text\"]"],
            ),
            ctx.timings.control,
        )
        .await
        .map_err(|e| e.context("rename document: no name field"))?;
    ctx.surface.fill(&field, new_name).await?;

    let save = Candidates::new(
        "save name button",
        [
            "button:has-text(\"Save\")",
            "button:has-text(\"Confirm\")",
            "button[type=\"submit\"]",
        ],
    );
    match ctx.find(scope.as_ref(), &save, Duration::from_secs(2)).await {
        Ok(button) => ctx.surface.click(&button, false).await?,
        Err(_) => ctx.surface.press(&field, "Enter").await?,
    }
    ctx.pause(LIST_SETTLE).await;
    ctx.reject_error(&super::error_text(), "rename document").await?;

    ctx.reload().await?;
    let outcome = Outcome::new()
        .body_contains(new_name)
        .visible(catalog::text_containing(new_name));
    let signal = ctx.require(&outcome, "renamed document").await?;
    Ok(FlowReport::passed("rename document", signal))
}

/// Deletes the first document, confirming when asked, and expects it gone after a reload.
///
/// Skipped when the document has no delete control.
pub async fn delete_first_document(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    ctx.open(FILES_ROUTE).await?;
    ctx.pause(LIST_SETTLE).await;
    let row = first_document(ctx).await?;
    let name = ctx
        .surface
        .text_content(&row)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string();

    let Ok(delete) = ctx.find_near(Some(&row), &row_action("Delete", "delete"), None).await else {
        return Ok(FlowReport::skipped("delete document", "no delete control"));
    };
    ctx.click_lenient(&delete).await?;
    ctx.pause(Duration::from_secs(1)).await;

    let confirm = Candidates::new(
        "confirm delete button",
        [
            "[data-testid*=\"confirm-delete\"]",
            "button:has-text(\"Confirm\")",
            "button:has-text(\"Yes\")",
            "button:has-text(\"Delete\")",
        ],
    );
    let scope = ctx.modal_scope().await;
    if let Ok(button) = ctx.find(scope.as_ref(), &confirm, ctx.timings.scope).await {
        ctx.surface.click(&button, false).await?;
    }
    ctx.pause(LIST_SETTLE).await;
    ctx.reject_error(&super::error_text(), "delete document").await?;
    tracing::info!("delete document: deleted '{}'", name);

    ctx.reload().await?;
    if name.is_empty() {
        return Ok(FlowReport::passed("delete document", "deleted (unnamed row)"));
    }
    let lingering = Outcome::new().visible(catalog::text_containing(&name));
    if let Some(seen) = lingering.any(ctx.surface, &ctx.resolver, LIST_SETTLE).await {
        return Err(Error::AssertionFailed(format!(
            "delete document: '{}' still listed after reload ({})",
            name, seen
        )));
    }
    Ok(FlowReport::passed("delete document", format!("'{}' gone after reload", name)))
}
