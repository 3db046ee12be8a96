// Integration tests for tolerant-OR outcomes and URL waits

use grabdocs_e2e::locator::{Candidates, Resolver};
use grabdocs_e2e::outcome::{Outcome, UrlPattern, wait_for_url, wait_until_gone};
use grabdocs_e2e::Error;
use std::time::Duration;

use fake_surface::{Change, FakeElement, FakePage, FakeSurface};

// ============================================================================
// Outcome::any / require
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_first_observed_signal_wins() {
    let surface = FakeSurface::new()
        .showing("/calendar", FakePage::new().body("Calendar"))
        .schedule(
            Duration::from_secs(3),
            Change::Body("Calendar Team Sync created".to_string()),
        );

    let outcome = Outcome::new()
        .visible("[data-testid*=\"event\"]")
        .body_contains("Team Sync");
    let label = outcome
        .any(&surface, &Resolver::default(), Duration::from_secs(10))
        .await;
    assert_eq!(label.as_deref(), Some("page text contains 'Team Sync'"));
}

#[tokio::test(start_paused = true)]
async fn test_any_visible_reports_matching_selector() {
    let surface = FakeSurface::new().showing(
        "/files",
        FakePage::new().element(FakeElement::new("[class*=\"doc-card\"]")),
    );

    let outcome = Outcome::new().any_visible(["[data-testid=\"doc-card\"]", "[class*=\"doc-card\"]"]);
    let label = outcome
        .any(&surface, &Resolver::default(), Duration::from_secs(2))
        .await
        .expect("one card selector is visible");
    assert!(label.contains("[class*=\"doc-card\"]"), "{}", label);
}

#[tokio::test(start_paused = true)]
async fn test_require_lists_every_accepted_signal() {
    let surface = FakeSurface::new().showing("/links", FakePage::new().body("Quick Links"));

    let outcome = Outcome::new()
        .body_contains("Docs Home")
        .visible("[class*=\"link\"]:has-text(\"Docs Home\")")
        .url_matches(UrlPattern::new("/links/\\d+").unwrap());
    let err = outcome
        .require(&surface, &Resolver::default(), Duration::from_secs(2), "created link")
        .await
        .unwrap_err();

    let Error::AssertionFailed(message) = err else {
        panic!("expected an assertion failure");
    };
    assert!(message.starts_with("created link: none of ["), "{}", message);
    assert!(message.contains("Docs Home"), "{}", message);
    assert!(message.contains("/links/\\d+"), "{}", message);
    assert!(message.contains("https://app.test/links"), "{}", message);
}

#[tokio::test(start_paused = true)]
async fn test_body_length_signal() {
    let surface = FakeSurface::new().showing("/analysis", FakePage::new().body(&"x".repeat(150)));

    let label = Outcome::new()
        .visible("canvas")
        .body_longer_than(100)
        .any(&surface, &Resolver::default(), Duration::from_secs(1))
        .await;
    assert!(label.is_some());
}

// ============================================================================
// URL and disappearance waits
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_url_sees_late_navigation() {
    let surface = FakeSurface::new()
        .route("/dashboard", FakePage::new())
        .showing("/login", FakePage::new())
        .schedule(Duration::from_secs(4), Change::navigate("/dashboard"));

    let dashboard = UrlPattern::dashboard_or_upload();
    assert!(!wait_for_url(&surface, &dashboard, Duration::from_secs(1), Duration::from_millis(250)).await);
    assert!(wait_for_url(&surface, &dashboard, Duration::from_secs(10), Duration::from_millis(250)).await);
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_gone() {
    let spinner = "internal:text=/loading.*analytics/i";
    let surface = FakeSurface::new()
        .showing(
            "/analysis",
            FakePage::new().element(FakeElement::new(spinner).text("Loading analytics...")),
        )
        .schedule(Duration::from_secs(3), Change::Hide(spinner.to_string()));
    let candidates = Candidates::new("spinner", [spinner]);
    let resolver = Resolver::default();

    assert!(!wait_until_gone(&surface, &resolver, &candidates, Duration::from_secs(1)).await);
    assert!(wait_until_gone(&surface, &resolver, &candidates, Duration::from_secs(5)).await);
}
