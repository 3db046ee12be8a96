// Chat history panel: open it, list conversations, delete one

use super::chat::CHAT_ROUTE;
use super::{FlowContext, FlowReport};
use crate::error::{Error, Result};
use crate::locator::{Candidates, KeywordScan, catalog};
use crate::outcome::Outcome;
use crate::surface::Target;
use std::time::Duration;

pub const HISTORY_ROUTE: &str = "/chat/history";

const SLIDE_IN: Duration = Duration::from_secs(2);

/// Characters of a conversation's text used to recognise it after deletion
const IDENTITY_PREFIX: usize = 30;

fn history_icons() -> Candidates {
    Candidates::new(
        "history icon",
        [
            "[data-testid*=\"history\"]",
            "[aria-label*=\"history\" i]",
            "button[title*=\"history\" i]",
            "svg[aria-label*=\"history\" i]",
            "button:has(svg[aria-label*=\"history\" i])",
            "[class*=\"history-icon\"]",
            "[class*=\"history-button\"]",
            "button:has-text(\"History\")",
            "button:has-text(\"Show History\")",
        ],
    )
}

fn conversations() -> Candidates {
    Candidates::new(
        "conversation",
        [
            "[data-testid*=\"conversation\"]",
            "[data-testid*=\"chat-item\"]",
            "[class*=\"conversation\"]",
            "[class*=\"chat-item\"]",
            "[class*=\"history-item\"]",
            "a[href*=\"/chat/\"]",
            "li",
            "[role=\"listitem\"]",
        ],
    )
}

fn list_containers() -> [&'static str; 10] {
    [
        "[class*=\"history-list\"]",
        "[class*=\"conversation-list\"]",
        "[class*=\"history\"]",
        "[class*=\"sidebar\"]",
        "[class*=\"panel\"]",
        "ul",
        "ol",
        "[role=\"list\"]",
        "[class*=\"slide\"]",
        "[class*=\"drawer\"]",
    ]
}

fn delete_controls() -> Candidates {
    Candidates::new(
        "delete control",
        [
            "svg[aria-label*=\"delete\" i]",
            "button[aria-label*=\"delete\" i]",
            "[data-testid*=\"delete\"]",
            "[class*=\"delete-icon\"]",
            "[class*=\"delete-button\"]",
            "button:has-text(\"Delete\")",
        ],
    )
}

fn confirm_buttons() -> Candidates {
    Candidates::new(
        "confirm button",
        [
            "button:has-text(\"Confirm\")",
            "button:has-text(\"Delete\")",
            "button:has-text(\"Yes\")",
            "button:has-text(\"OK\")",
        ],
    )
}

/// Opens the history panel from /upload.
///
/// Returns `false` when no history icon exists and the history route was
/// opened instead.
pub async fn open_history(ctx: &FlowContext<'_>) -> Result<bool> {
    ctx.open(CHAT_ROUTE).await?;
    let scan = KeywordScan::new(["button", "[role=\"button\"]", "svg", "[class*=\"icon\"]"])
        .keywords(&["history"])
        .cap(50);
    match ctx.find_or_scan(None, &history_icons(), Some(&scan)).await {
        Ok(icon) => {
            ctx.surface.click(&icon, false).await?;
            ctx.pause(SLIDE_IN).await;
            Ok(true)
        }
        Err(_) => {
            tracing::warn!("No history icon, opening {} directly", HISTORY_ROUTE);
            ctx.surface.goto(&ctx.config.url_for(HISTORY_ROUTE)).await?;
            ctx.pause(SLIDE_IN).await;
            Ok(false)
        }
    }
}

/// Expects the conversations list (or a list container) once history is open.
pub async fn view(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    if !open_history(ctx).await? {
        ctx.surface.body_text().await?;
        return Ok(FlowReport::passed("chat history", format!("opened {}", HISTORY_ROUTE)));
    }
    let outcome = Outcome::new()
        .any_visible(conversations().selectors().iter().cloned())
        .any_visible(list_containers());
    let signal = ctx.require(&outcome, "conversation list").await?;
    Ok(FlowReport::passed("chat history", signal))
}

async fn first_conversation(ctx: &FlowContext<'_>) -> Option<(Target, String)> {
    for selector in conversations().selectors() {
        let all = Target::main(selector.as_str());
        let count = ctx.surface.count(&all).await.unwrap_or(0);
        for index in 0..count.min(10) {
            let item = all.nth(index);
            if !ctx.resolver.probe(ctx.surface, &item).await {
                continue;
            }
            let text = ctx
                .surface
                .text_content(&item)
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            if !text.trim().is_empty() || selector.contains("conversation") || selector.contains("chat") {
                return Some((item, text.trim().to_string()));
            }
        }
    }
    None
}

async fn delete_control(ctx: &FlowContext<'_>, conversation: &Target) -> Option<Target> {
    let controls = delete_controls();
    if let Ok(found) = ctx
        .resolver
        .resolve_within(ctx.surface, conversation, &controls, SLIDE_IN)
        .await
    {
        return Some(found);
    }
    if let Some(found) = ctx.resolver.try_resolve(ctx.surface, &controls, SLIDE_IN).await {
        return Some(found);
    }
    KeywordScan::new(["svg", "button", "[role=\"button\"]"])
        .keywords(&["delete"])
        .cap(10)
        .within(conversation.within(".."))
        .find(ctx.surface, &ctx.resolver)
        .await
}

/// Deletes the first conversation and expects it gone after a reload.
///
/// Skipped when there is no conversation or no delete control.
pub async fn delete_first(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    open_history(ctx).await?;

    let Some((conversation, text)) = first_conversation(ctx).await else {
        return Ok(FlowReport::skipped("delete conversation", "no conversations"));
    };
    ctx.surface.hover(&conversation).await?;
    ctx.pause(Duration::from_millis(500)).await;

    let Some(delete) = delete_control(ctx, &conversation).await else {
        return Ok(FlowReport::skipped("delete conversation", "no delete control"));
    };
    ctx.surface.click(&delete, false).await?;
    ctx.pause(Duration::from_secs(1)).await;

    if let Some(confirm) = ctx
        .resolver
        .try_resolve(ctx.surface, &confirm_buttons(), ctx.timings.scope)
        .await
    {
        ctx.surface.click(&confirm, false).await?;
    }
    ctx.pause(SLIDE_IN).await;
    tracing::info!("delete conversation: deleted '{}'", text);

    ctx.reload().await?;
    let reopen = Candidates::new("history icon", history_icons().selectors()[..3].iter().cloned());
    if let Some(icon) = ctx.resolver.try_resolve(ctx.surface, &reopen, ctx.timings.scope).await {
        ctx.surface.click(&icon, false).await?;
        ctx.pause(SLIDE_IN).await;
    }

    let prefix: String = text.chars().take(IDENTITY_PREFIX).collect();
    if prefix.is_empty() {
        return Ok(FlowReport::passed("delete conversation", "deleted (untitled conversation)"));
    }
    // Shared data-testids make the text the only reliable identity
    let lingering = Outcome::new().visible(catalog::text_containing(&prefix));
    if let Some(seen) = lingering.any(ctx.surface, &ctx.resolver, SLIDE_IN).await {
        return Err(Error::AssertionFailed(format!(
            "delete conversation: still present after reload ({})",
            seen
        )));
    }
    Ok(FlowReport::passed("delete conversation", "conversation gone after reload"))
}
