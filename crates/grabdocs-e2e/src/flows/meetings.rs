// Video meetings: create, schedule and edit meetings, join, start and end them,
// invite participants, and use the in-meeting camera and chat

use super::{CreateAndVerify, FieldFill, FlowContext, FlowReport, error_text, success_signals};
use crate::error::{Error, Result};
use crate::locator::{Candidates, KeywordRule, KeywordScan, catalog};
use crate::outcome::{Outcome, UrlPattern};
use crate::surface::Target;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

pub const MEETINGS_ROUTE: &str = "/video-meeting";

/// Sent when no meeting ID can be read from the list; the app answers with a validation error
pub const PLACEHOLDER_MEETING_ID: &str = "TEST-ID-PLACEHOLDER";

static LABELLED_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:meeting\s*)?id\b[:\s]*([a-z0-9-]{3,})").expect("static pattern")
});

static BARE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z0-9]{6,})").expect("static pattern"));

/// Reads a meeting ID out of a meeting card's text.
///
/// Prefers an explicitly labelled ID, then any upper-case code of six or more characters.
pub fn extract_meeting_id(text: &str) -> Option<String> {
    LABELLED_ID
        .captures(text)
        .or_else(|| BARE_CODE.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|id| !id.is_empty())
}

fn end_active_meeting() -> Candidates {
    Candidates::new(
        "end meeting button",
        [
            "button:has-text(\"End Meeting\")",
            "[data-testid*=\"end-meeting\"]",
            "button[aria-label*=\"end meeting\" i]",
        ],
    )
}

fn create_buttons() -> Candidates {
    Candidates::new(
        "create meeting button",
        [
            "button:has-text(\"Create Meeting\")",
            "button:has-text(\"Create a Meeting\")",
            "button:has-text(\"New Meeting\")",
            "button:has-text(\"Create\")",
            "[data-testid*=\"create-meeting\"]",
            "[data-testid*=\"new-meeting\"]",
            "[aria-label*=\"create meeting\" i]",
        ],
    )
}

fn meeting_title_fields() -> Candidates {
    Candidates::new(
        "meeting title field",
        [
            "input[name*=\"title\"]",
            "input[name*=\"name\"]",
            "input[placeholder*=\"meeting\" i]",
            "input[placeholder*=\"title\" i]",
        ],
    )
}

fn meeting_cards() -> [&'static str; 5] {
    [
        "[class*=\"meeting\"]",
        "[data-testid*=\"meeting\"]",
        "[class*=\"card\"]",
        "[class*=\"item\"]",
        "[class*=\"list-item\"]",
    ]
}

/// The create-meeting flow for `title`
pub fn create_meeting_flow(title: &str) -> CreateAndVerify {
    CreateAndVerify::new("create meeting", MEETINGS_ROUTE)
        .dismiss_first(end_active_meeting())
        .open_with(
            create_buttons(),
            Some(
                KeywordScan::new(["button", "[role=\"button\"]"])
                    .rule(KeywordRule::all_of(&["create", "meeting"])),
            ),
        )
        .field(FieldFill::required(meeting_title_fields(), title))
        .submit_with(
            Candidates::new(
                "save meeting button",
                [
                    "button:has-text(\"Create Meeting\")",
                    "button:has-text(\"Create\")",
                    "button:has-text(\"Save\")",
                    "button[type=\"submit\"]",
                    "[data-testid*=\"create\"]",
                    "[data-testid*=\"save\"]",
                ],
            ),
            &["create", "save"],
        )
        .accept_toast(
            Outcome::new()
                .visible(catalog::text_matching("created|success|saved|meeting.*created"))
                .any_visible(success_signals()),
        )
        .revisit_before_verify()
        .verify_with(
            Outcome::new()
                .body_contains(title)
                .visible("[class*=\"meeting\"]:has-text(\"meeting\")")
                .visible("[data-testid*=\"meeting\"]"),
        )
        .fail_on(error_text())
}

/// Creates a meeting titled `title` and expects it listed.
pub async fn create_meeting(ctx: &FlowContext<'_>, title: &str) -> Result<FlowReport> {
    create_meeting_flow(title).run(ctx).await
}

fn mentions_any(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

// First visible meeting card whose text `accept` takes, with that text
async fn find_card(
    ctx: &FlowContext<'_>,
    accept: impl Fn(&str) -> bool,
) -> Option<(Target, String)> {
    for selector in meeting_cards() {
        let cards = Target::main(selector);
        let count = ctx.surface.count(&cards).await.unwrap_or(0);
        for index in 0..count.min(30) {
            let card = cards.nth(index);
            if !ctx.resolver.probe(ctx.surface, &card).await {
                continue;
            }
            let text = ctx.surface.text_content(&card).await.ok().flatten().unwrap_or_default();
            if accept(&text) {
                return Some((card, text));
            }
        }
    }
    None
}

// First meeting ID found in the visible cards, else anywhere on the page
async fn listed_meeting_id(ctx: &FlowContext<'_>) -> Option<String> {
    let listed = find_card(ctx, |text| {
        !mentions_any(text, &["home", "dashboard"]) && extract_meeting_id(text).is_some()
    })
    .await;
    if let Some((_, text)) = listed {
        return extract_meeting_id(&text);
    }
    let body = ctx.surface.body_text().await.ok()?;
    extract_meeting_id(&body)
}

/// Opens the join form, enters `id` (read from the meeting list when `None`)
/// and an optional passcode, and clicks Join.
///
/// Reaching a meeting room, an error message and a validation message all
/// count: each shows the join form works. Staying on the list does not.
pub async fn join_with_id(
    ctx: &FlowContext<'_>,
    id: Option<&str>,
    passcode: Option<&str>,
) -> Result<FlowReport> {
    ctx.open(MEETINGS_ROUTE).await?;
    ctx.dismiss(&end_active_meeting()).await?;

    let meeting_id = match id {
        Some(id) => id.to_string(),
        None => listed_meeting_id(ctx).await.unwrap_or_else(|| {
            tracing::warn!("No meeting ID in the list, joining with a placeholder");
            PLACEHOLDER_MEETING_ID.to_string()
        }),
    };

    let join_tab = Candidates::new(
        "join meeting tab",
        [
            "button:has-text(\"Join Meeting\")",
            "button:has-text(\"Join\")",
            "a:has-text(\"Join Meeting\")",
            "a:has-text(\"Join\")",
            "[data-testid*=\"join-meeting\"]",
            "[data-testid*=\"join\"]",
            "[aria-label*=\"join meeting\" i]",
            "[role=\"tab\"]:has-text(\"Join\")",
        ],
    );
    let join_scan = KeywordScan::new(["button", "a[href]", "[role=\"button\"]", "[role=\"tab\"]"])
        .rule(KeywordRule::all_of(&["join", "meeting"]))
        .rule(KeywordRule::exact("join"))
        .cap(50);
    let tab = ctx.find_or_scan(None, &join_tab, Some(&join_scan)).await?;
    ctx.surface.click(&tab, false).await?;
    ctx.pause(ctx.timings.after_action).await;

    let id_field = ctx
        .resolver
        .resolve_enabled(
            ctx.surface,
            &Candidates::new(
                "meeting ID field",
                [
                    "input[name*=\"meetingId\"]",
                    "input[name*=\"meeting-id\"]",
                    "input[name*=\"id\"]",
                    "input[placeholder*=\"meeting id\" i]",
                    "input[placeholder*=\"ID\" i]",
                    "input[type=\"text\"]",
                ],
            ),
            ctx.timings.control,
        )
        .await?;
    ctx.surface.fill(&id_field, &meeting_id).await?;

    if let Some(code) = passcode {
        let passcode_fields = Candidates::new(
            "meeting passcode field",
            [
                "input[name*=\"passcode\"]",
                "input[name*=\"password\"]",
                "input[name*=\"pin\"]",
                "input[type=\"password\"]",
                "input[placeholder*=\"passcode\" i]",
                "input[placeholder*=\"PIN\" i]",
            ],
        );
        match ctx
            .resolver
            .resolve_enabled(ctx.surface, &passcode_fields, Duration::from_secs(2))
            .await
        {
            Ok(field) => ctx.surface.fill(&field, code).await?,
            Err(_) => tracing::debug!("join meeting: no passcode field"),
        }
    }

    let join_button = KeywordScan::new(["button", "[role=\"button\"]"])
        .keywords(&["join"])
        .cap(50);
    let submit = Candidates::new(
        "join button",
        [
            "button:has-text(\"Join\")",
            "button[type=\"submit\"]",
            "[data-testid*=\"join\"]",
        ],
    );
    let button = ctx
        .find_or_scan(None, &submit, Some(&join_button))
        .await
        .map_err(|e| e.context("join meeting: no Join button"))?;
    ctx.click_lenient(&button).await?;
    ctx.pause(ctx.timings.after_action).await;

    let attempted = Outcome::new()
        .any_visible(["video", "audio", "[class*=\"video\"]", "[class*=\"conference\"]"])
        .url_matches(room_path()?)
        .visible(catalog::text_matching("invalid|error|failed|not found|incorrect"))
        .visible(catalog::text_matching("required|please enter|meeting id"));
    let signal = ctx
        .require(&attempted, "join meeting response")
        .await
        .map_err(|e| match e {
            Error::AssertionFailed(msg) => Error::AssertionFailed(format!("{} (id '{}')", msg, meeting_id)),
            other => other,
        })?;
    Ok(FlowReport::passed("join meeting", signal))
}

fn schedule_buttons() -> Candidates {
    Candidates::new(
        "schedule meeting button",
        [
            "button:has-text(\"Schedule Meeting\")",
            "button:has-text(\"Schedule\")",
            "button:has-text(\"New Meeting\")",
            "a:has-text(\"Schedule Meeting\")",
            "[data-testid*=\"schedule-meeting\"]",
            "[aria-label*=\"schedule meeting\" i]",
        ],
    )
}

/// Date `days` from today, as `YYYY-MM-DD` for date inputs
pub fn date_in_days(days: u64) -> String {
    (chrono::Local::now().date_naive() + chrono::Days::new(days))
        .format("%Y-%m-%d")
        .to_string()
}

/// The schedule-meeting flow for `title` on `date` (`YYYY-MM-DD`) at `time` (`HH:MM`)
pub fn schedule_meeting_flow(title: &str, date: &str, time: &str) -> CreateAndVerify {
    CreateAndVerify::new("schedule meeting", MEETINGS_ROUTE)
        .dismiss_first(end_active_meeting())
        .open_with(
            schedule_buttons(),
            Some(
                KeywordScan::new(["button", "a[href]", "[role=\"button\"]"])
                    .rule(KeywordRule::all_of(&["schedule", "meeting"]))
                    .cap(50),
            ),
        )
        .field(FieldFill::required(meeting_title_fields(), title))
        .field(FieldFill::optional(
            Candidates::new(
                "meeting date field",
                [
                    "input[type=\"date\"]",
                    "input[type=\"datetime-local\"]",
                    "input[name*=\"date\"]",
                    "input[placeholder*=\"date\" i]",
                ],
            ),
            date,
        ))
        .field(FieldFill::optional(
            Candidates::new(
                "meeting time field",
                [
                    "input[type=\"time\"]",
                    "input[name*=\"time\"]",
                    "input[placeholder*=\"time\" i]",
                ],
            ),
            time,
        ))
        .submit_with(
            Candidates::new(
                "save scheduled meeting button",
                [
                    "button:has-text(\"Schedule Meeting\")",
                    "button:has-text(\"Schedule\")",
                    "button:has-text(\"Create\")",
                    "button:has-text(\"Save\")",
                    "button[type=\"submit\"]",
                    "[data-testid*=\"schedule\"]",
                    "[data-testid*=\"save\"]",
                ],
            ),
            &["schedule", "create", "save"],
        )
        .accept_toast(Outcome::new().visible(catalog::text_matching(
            "scheduled|success|saved|meeting.*scheduled",
        )))
        .revisit_before_verify()
        .verify_with(
            Outcome::new()
                .body_contains(title)
                .any_visible(
                    meeting_cards()
                        .map(|card| format!("{}:has-text(\"{}\")", card, title.replace('"', ""))),
                ),
        )
        .fail_on(failure_text())
}

/// Schedules `title` for tomorrow at 14:00 and expects it listed.
pub async fn schedule_meeting(ctx: &FlowContext<'_>, title: &str) -> Result<FlowReport> {
    schedule_meeting_flow(title, &date_in_days(1), "14:00").run(ctx).await
}

fn failure_text() -> Candidates {
    Candidates::new("error message", [catalog::text_matching("error|failed|invalid")])
}

fn start_controls() -> Candidates {
    Candidates::new(
        "start meeting control",
        [
            "button[aria-label*=\"start\" i]",
            "button[title*=\"start\" i]",
            "svg[aria-label*=\"start\" i]",
            "button:has(svg[aria-label*=\"start\" i])",
            "button:has-text(\"Start\")",
            "button:has-text(\"Start Meeting\")",
            "button:has-text(\"Join\")",
            "button:has-text(\"Join Meeting\")",
            "[data-testid*=\"start\"]",
            "[data-testid*=\"start-meeting\"]",
            "[class*=\"start-icon\"]",
            "[class*=\"play-icon\"]",
            "button:has(svg[class*=\"play\"])",
            "svg[class*=\"play\"]",
        ],
    )
}

fn icon_buttons(keywords: &[&str]) -> KeywordScan {
    KeywordScan::new(["button:has(svg)", "button[aria-label]", "button[title]"])
        .keywords(keywords)
        .cap(50)
}

// A meeting room's path; the meetings list itself never matches
fn room_path() -> Result<UrlPattern> {
    UrlPattern::path(r"^/(video-meeting/[^/]+|meetings?/[^/]+|room|conference)")
}

// Signals of being inside a meeting room rather than on the meetings list
fn in_meeting() -> Result<Outcome> {
    Ok(Outcome::new()
        .any_visible(["video", "audio", "[class*=\"conference\"]", "[class*=\"video-call\"]"])
        .visible(catalog::text_matching("mute|unmute|leave meeting"))
        .url_matches(room_path()?))
}

// Starts the first listed meeting and returns the in-meeting signal
async fn enter_meeting(ctx: &FlowContext<'_>) -> Result<String> {
    ctx.open(MEETINGS_ROUTE).await?;
    ctx.dismiss(&end_active_meeting()).await?;

    let card = find_card(ctx, |text| !mentions_any(text, &["home", "dashboard"]))
        .await
        .map(|(card, _)| card);
    let start = ctx
        .find_near(card.as_ref(), &start_controls(), Some(&icon_buttons(&["start", "join"])))
        .await
        .map_err(|e| e.context("start meeting: no start control"))?;
    ctx.click_lenient(&start).await?;
    ctx.pause(ctx.timings.after_action).await;

    let signal = ctx.require(&in_meeting()?, "meeting room").await?;
    ctx.reject_error(&error_text(), "start meeting").await?;
    Ok(signal)
}

/// Starts the first listed meeting from its start icon and expects the meeting room.
pub async fn start_meeting(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    let signal = enter_meeting(ctx).await?;
    Ok(FlowReport::passed("start meeting", signal))
}

fn invite_controls() -> Candidates {
    Candidates::new(
        "invite control",
        [
            "button[aria-label*=\"invite\" i]",
            "button[aria-label*=\"mail\" i]",
            "button[aria-label*=\"email\" i]",
            "button[title*=\"invite\" i]",
            "button[title*=\"mail\" i]",
            "button[title*=\"email\" i]",
            "button:has-text(\"Invite\")",
            "button:has-text(\"Share\")",
            "[data-testid*=\"invite\"]",
            "[data-testid*=\"mail\"]",
            "[data-testid*=\"email\"]",
            "button:has(svg[class*=\"mail\"])",
            "button:has(svg[class*=\"envelope\"])",
        ],
    )
}

/// Opens the first meeting's invite form, adds `email` and sends the invitation.
pub async fn invite_participant(ctx: &FlowContext<'_>, email: &str) -> Result<FlowReport> {
    ctx.open(MEETINGS_ROUTE).await?;
    ctx.dismiss(&end_active_meeting()).await?;

    let card = find_card(ctx, |text| !mentions_any(text, &["home", "dashboard"]))
        .await
        .map(|(card, _)| card);
    let invite = ctx
        .find_near(
            card.as_ref(),
            &invite_controls(),
            Some(&icon_buttons(&["invite", "mail", "email", "share"])),
        )
        .await
        .map_err(|e| e.context("invite participant: no invite control"))?;
    ctx.click_lenient(&invite).await?;
    ctx.pause(ctx.timings.after_action).await;

    let scope = ctx.modal_scope().await;
    let field = ctx
        .find(
            scope.as_ref(),
            &Candidates::new(
                "participant e-mail field",
                [
                    "input[type=\"email\"]",
                    "input[name*=\"email\"]",
                    "input[name*=\"participant\"]",
                    "input[placeholder*=\"email\" i]",
                    "input[placeholder*=\"participant\" i]",
                    "input[placeholder*=\"invite\" i]",
                ],
            ),
            ctx.timings.control,
        )
        .await
        .map_err(|e| e.context("invite participant: invite form not found"))?;
    ctx.surface.fill(&field, email).await?;

    let add = Candidates::new("add participant button", ["button:has-text(\"Add\")"]);
    let add_scan = KeywordScan::new(["button"]).rule(KeywordRule::exact("add")).cap(20);
    let add_scan = match &scope {
        Some(modal) => add_scan.within(modal.clone()),
        None => add_scan,
    };
    match ctx.find(scope.as_ref(), &add, Duration::from_secs(2)).await {
        Ok(button) => ctx.surface.click(&button, false).await?,
        Err(_) => {
            if let Some(button) = add_scan.find(ctx.surface, &ctx.resolver).await {
                ctx.surface.click(&button, false).await?;
            }
        }
    }
    ctx.pause(Duration::from_secs(1)).await;

    let send = Candidates::new(
        "send invitation button",
        [
            "button:has-text(\"Send Invite\")",
            "button:has-text(\"Send\")",
            "button:has-text(\"Invite\")",
            "button[type=\"submit\"]",
            "[data-testid*=\"send\"]",
            "[data-testid*=\"invite\"]",
        ],
    );
    let send_scan = KeywordScan::new(["button", "[role=\"button\"]"]).keywords(&["send", "invite"]);
    let button = ctx
        .find_or_scan(scope.as_ref(), &send, Some(&send_scan))
        .await
        .map_err(|e| e.context("invite participant: no Send button"))?;
    ctx.click_lenient(&button).await?;
    tracing::info!("invite participant: invitation sent to {}", email);
    ctx.pause(ctx.timings.after_action).await;

    let outcome = Outcome::new()
        .visible(catalog::text_matching("invited|sent|success"))
        .any_visible(["[role=\"alert\"]", "[class*=\"toast\"]"])
        .body_contains(email);
    let signal = ctx.require(&outcome, "invitation sent").await?;
    ctx.reject_error(&failure_text(), "invite participant").await?;
    Ok(FlowReport::passed("invite participant", signal))
}

fn edit_controls() -> Candidates {
    Candidates::new(
        "edit meeting control",
        [
            "button[aria-label*=\"edit\" i]",
            "button[aria-label*=\"update\" i]",
            "button[title*=\"edit\" i]",
            "button[title*=\"update\" i]",
            "button:has-text(\"Edit\")",
            "button:has-text(\"Update\")",
            "[data-testid*=\"edit\"]",
            "[data-testid*=\"update\"]",
            "[class*=\"edit-icon\"]",
            "[class*=\"pencil-icon\"]",
            "button:has(svg[class*=\"pencil\"])",
            "button:has(svg[class*=\"edit\"])",
        ],
    )
}

/// Renames the first listed meeting to `new_title` and expects it after a reload.
pub async fn edit_meeting(ctx: &FlowContext<'_>, new_title: &str) -> Result<FlowReport> {
    ctx.open(MEETINGS_ROUTE).await?;
    ctx.dismiss(&end_active_meeting()).await?;

    let card = find_card(ctx, |text| {
        !text.trim().is_empty() && !mentions_any(text, &["home", "dashboard", "create", "join"])
    })
    .await
    .map(|(card, _)| card);
    let edit = ctx
        .find_near(card.as_ref(), &edit_controls(), Some(&icon_buttons(&["edit", "update"])))
        .await
        .map_err(|e| e.context("edit meeting: no edit control"))?;
    ctx.click_lenient(&edit).await?;
    ctx.pause(ctx.timings.after_action).await;

    let scope = ctx.modal_scope().await;
    let title = ctx
        .find(scope.as_ref(), &meeting_title_fields(), ctx.timings.control)
        .await
        .map_err(|e| e.context("edit meeting: form not found"))?;
    ctx.surface.fill(&title, "").await?;
    ctx.surface.fill(&title, new_title).await?;

    let save = Candidates::new(
        "save meeting changes button",
        [
            "button:has-text(\"Save\")",
            "button:has-text(\"Update\")",
            "button:has-text(\"Save Changes\")",
            "button:has-text(\"Update Meeting\")",
            "button[type=\"submit\"]",
            "[data-testid*=\"save\"]",
            "[data-testid*=\"update\"]",
        ],
    );
    let save_scan = KeywordScan::new(["button", "[role=\"button\"]"]).keywords(&["save", "update"]);
    let button = ctx
        .find_or_scan(scope.as_ref(), &save, Some(&save_scan))
        .await
        .map_err(|e| e.context("edit meeting: no Save button"))?;
    ctx.surface.click(&button, false).await?;
    ctx.pause(ctx.timings.after_action).await;
    ctx.reload().await?;

    let outcome = Outcome::new()
        .body_contains(new_title)
        .visible(catalog::text_matching("updated|saved|success"));
    let signal = ctx.require(&outcome, "edit meeting").await?;
    ctx.reject_error(&failure_text(), "edit meeting").await?;
    Ok(FlowReport::passed("edit meeting", signal))
}

/// Starts a meeting, leaves it, confirms ending it and expects the meetings list back.
pub async fn end_meeting(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    enter_meeting(ctx).await?;

    let leave = Candidates::new(
        "leave meeting button",
        [
            "button:has-text(\"Leave Meeting\")",
            "button:has-text(\"Leave\")",
            "button[aria-label*=\"leave meeting\" i]",
            "button[aria-label*=\"leave\" i]",
            "[data-testid*=\"leave\"]",
            "[data-testid*=\"leave-meeting\"]",
        ],
    );
    let button = ctx
        .find_or_scan(None, &leave, Some(&icon_buttons(&["leave"])))
        .await
        .map_err(|e| e.context("end meeting: no Leave button"))?;
    ctx.click_lenient(&button).await?;
    ctx.pause(Duration::from_secs(1)).await;

    let confirm = Candidates::new(
        "end meeting confirmation",
        [
            "button:has-text(\"End Meeting\")",
            "button:has-text(\"End\")",
            "button:has-text(\"Confirm\")",
            "button:has-text(\"Yes\")",
        ],
    );
    if let Some(button) = ctx.resolver.try_resolve(ctx.surface, &confirm, ctx.timings.scope).await {
        ctx.surface.click(&button, false).await?;
    }
    ctx.pause(ctx.timings.after_action).await;

    let outcome = Outcome::new()
        .url_matches(UrlPattern::path(r"^/video-meeting/?$")?)
        .visible(catalog::text_matching("ended|closed|success"));
    let signal = ctx.require(&outcome, "meeting ended").await?;
    ctx.reject_error(&error_text(), "end meeting").await?;
    Ok(FlowReport::passed("end meeting", signal))
}

fn video_toggles() -> Candidates {
    Candidates::new(
        "video toggle",
        [
            "button[aria-label*=\"video\" i]",
            "button[aria-label*=\"camera\" i]",
            "button[title*=\"video\" i]",
            "button[title*=\"camera\" i]",
            "[data-testid*=\"video\"]",
            "[data-testid*=\"camera\"]",
            "button:has(svg[aria-label*=\"video\" i])",
            "button:has(svg[aria-label*=\"camera\" i])",
        ],
    )
}

fn mic_toggles() -> Candidates {
    Candidates::new(
        "microphone toggle",
        [
            "button[aria-label*=\"mic\" i]",
            "button[aria-label*=\"microphone\" i]",
            "button[title*=\"mic\" i]",
            "[data-testid*=\"mic\"]",
        ],
    )
}

// The pre-join device check: flip both toggles, then join
async fn pass_device_check(ctx: &FlowContext<'_>) -> Result<()> {
    let Some(dialog) = ctx.modal_scope().await else {
        return Ok(());
    };
    let text = ctx.surface.text_content(&dialog).await.ok().flatten().unwrap_or_default();
    if !mentions_any(&text, &["video", "camera", "microphone", "mic"]) {
        return Ok(());
    }
    tracing::debug!("toggle video: device check dialog open");
    for toggles in [video_toggles(), mic_toggles()] {
        if let Ok(toggle) = ctx.find(Some(&dialog), &toggles, Duration::from_secs(2)).await {
            ctx.click_lenient(&toggle).await?;
        }
    }
    let join = Candidates::new(
        "join from device check",
        [
            "button:has-text(\"Join\")",
            "button:has-text(\"Join Meeting\")",
            "button:has-text(\"Continue\")",
            "button:has-text(\"Start\")",
        ],
    );
    if let Ok(button) = ctx.find(Some(&dialog), &join, Duration::from_secs(2)).await {
        ctx.click_lenient(&button).await?;
        ctx.pause(ctx.timings.after_action).await;
    }
    Ok(())
}

async fn aria_label(ctx: &FlowContext<'_>, target: &Target) -> String {
    ctx.surface
        .attribute(target, "aria-label")
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

fn state_word(label: &str) -> bool {
    mentions_any(label, &["off", "disable", "on", "enable"])
}

/// Starts a meeting and turns the camera off and back on.
///
/// The toggle works when its label changes between clicks or names the state it is in.
pub async fn toggle_video(ctx: &FlowContext<'_>) -> Result<FlowReport> {
    enter_meeting(ctx).await?;
    pass_device_check(ctx).await?;

    let scan = KeywordScan::new(["button:has(svg)", "button[aria-label]"])
        .keywords(&["video", "camera"])
        .cap(50);
    let toggle = ctx
        .find_or_scan(None, &video_toggles(), Some(&scan))
        .await
        .map_err(|e| e.context("toggle video: no video control"))?;

    let before = aria_label(ctx, &toggle).await;
    ctx.click_lenient(&toggle).await?;
    ctx.pause(Duration::from_secs(1)).await;
    let after = aria_label(ctx, &toggle).await;
    ctx.click_lenient(&toggle).await?;
    ctx.pause(Duration::from_secs(1)).await;
    let restored = aria_label(ctx, &toggle).await;
    tracing::debug!("toggle video: '{}' -> '{}' -> '{}'", before, after, restored);

    if before != after || state_word(&after) {
        return Ok(FlowReport::passed(
            "toggle video",
            format!("video control '{}' -> '{}'", before, after),
        ));
    }
    Err(Error::AssertionFailed(format!(
        "toggle video: control label did not change ('{}')",
        before
    )))
}

/// Starts a meeting, opens its chat panel and expects `message` in the conversation.
pub async fn chat_in_meeting(ctx: &FlowContext<'_>, message: &str) -> Result<FlowReport> {
    enter_meeting(ctx).await?;

    let chat = Candidates::new(
        "meeting chat button",
        [
            "button[aria-label*=\"chat\" i]",
            "button[title*=\"chat\" i]",
            "button:has-text(\"Chat\")",
            "[data-testid*=\"chat\"]",
            "button:has(svg[aria-label*=\"chat\" i])",
        ],
    );
    match ctx.find_or_scan(None, &chat, Some(&icon_buttons(&["chat"]))).await {
        Ok(button) => {
            ctx.click_lenient(&button).await?;
            ctx.pause(Duration::from_secs(1)).await;
        }
        Err(_) => tracing::debug!("meeting chat: no chat button, looking for an open panel"),
    }

    let input = ctx
        .find(
            None,
            &Candidates::new(
                "meeting chat input",
                [
                    "input[placeholder*=\"message\" i]",
                    "textarea[placeholder*=\"message\" i]",
                    "input[placeholder*=\"chat\" i]",
                    "textarea[placeholder*=\"chat\" i]",
                    "input[placeholder*=\"type\" i]",
                    "textarea[placeholder*=\"type\" i]",
                    "[contenteditable=\"true\"]",
                    "[role=\"textbox\"]",
                ],
            ),
            ctx.timings.control,
        )
        .await
        .map_err(|e| e.context("meeting chat: no message input"))?;
    ctx.surface.fill(&input, message).await?;

    let send = Candidates::new(
        "meeting chat send button",
        [
            "button[aria-label*=\"send\" i]",
            "button[title*=\"send\" i]",
            "button:has-text(\"Send\")",
            "button[type=\"submit\"]",
            "[data-testid*=\"send\"]",
        ],
    );
    match ctx.resolver.try_resolve(ctx.surface, &send, Duration::from_secs(2)).await {
        Some(button) => ctx.click_lenient(&button).await?,
        None => ctx.surface.press(&input, "Enter").await?,
    }
    ctx.pause(Duration::from_secs(2)).await;

    let clean = message.replace('"', "");
    let outcome = Outcome::new()
        .body_contains(message)
        .visible(format!("[class*=\"message\"]:has-text(\"{}\")", clean));
    let signal = ctx.require(&outcome, "meeting chat message").await?;
    ctx.reject_error(&error_text(), "meeting chat").await?;
    Ok(FlowReport::passed("meeting chat", signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_labelled_meeting_id() {
        assert_eq!(
            extract_meeting_id("Standup  Meeting ID: 842-113-907  Join"),
            Some("842-113-907".to_string())
        );
        assert_eq!(extract_meeting_id("id abc123"), Some("abc123".to_string()));
        assert_eq!(extract_meeting_id("video room"), None);
    }

    #[test]
    fn test_extract_bare_code() {
        assert_eq!(
            extract_meeting_id("Weekly sync XK29QP7 starts soon"),
            Some("XK29QP7".to_string())
        );
        assert_eq!(extract_meeting_id("Weekly sync"), None);
    }

    #[test]
    fn test_create_meeting_dismisses_active_meeting_first() {
        let flow = create_meeting_flow("Test Meeting 1");
        assert!(flow.dismiss.is_some());
        assert_eq!(flow.submit_keywords, vec!["create", "save"]);
    }

    #[test]
    fn test_schedule_fills_optional_date_and_time() {
        let flow = schedule_meeting_flow("Planning", "2026-10-15", "14:00");
        assert_eq!(flow.fields.len(), 3);
        assert!(flow.fields[0].required);
        assert!(!flow.fields[1].required && !flow.fields[2].required);
        assert_eq!(flow.fields[1].value, "2026-10-15");
        assert_eq!(flow.submit_keywords, vec!["schedule", "create", "save"]);
    }

    #[test]
    fn test_date_in_days_is_iso() {
        let date = date_in_days(1);
        assert_eq!(date.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn test_meeting_room_is_not_the_list() {
        let room = in_meeting().unwrap();
        let Some(crate::outcome::Signal::UrlMatches(pattern)) = room.signals().last() else {
            panic!("room outcome ends with a URL signal");
        };
        assert!(pattern.is_match("https://app.test/video-meeting/abc-123"));
        assert!(pattern.is_match("https://app.test/room?id=9"));
        assert!(!pattern.is_match("https://app.test/video-meeting"));
        assert!(!pattern.is_match("https://app.test/video-meeting/"));
    }

    #[test]
    fn test_state_words() {
        assert!(state_word("Turn off camera"));
        assert!(state_word("Enable video"));
        assert!(!state_word("Camera"));
    }
}
