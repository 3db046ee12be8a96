// Integration tests for the Session Establisher
//
// Each test scripts a fake app (login form, verification step, dashboard)
// and drives `establish` to completion on tokio's paused clock.

use grabdocs_e2e::config::{Credentials, E2eConfig, OtpMode};
use grabdocs_e2e::locator::Resolver;
use grabdocs_e2e::session::{AuthPath, LoginTimings, SessionEstablisher, SnapshotStore};
use grabdocs_e2e::{Error, init_tracing};
use playwright_rs::StorageState;
use std::time::Duration;
use tempfile::TempDir;

use fake_surface::{BASE_URL, Change, FakeElement, FakePage, FakeSurface, session_cookie};

const EMAIL: &str = "qa@grabdocs.test";
const PASSWORD: &str = "correct-horse";
const SUBMIT: &str = "button[type=\"submit\"]";
const VERIFY: &str = "button:has-text(\"Verify\")";

fn config(dir: &TempDir) -> E2eConfig {
    E2eConfig {
        base_url: url::Url::parse(BASE_URL).unwrap(),
        credentials: Credentials::new(EMAIL, PASSWORD),
        storage_state_path: dir.path().join(".auth").join("storage-state.json"),
        ..Default::default()
    }
}

fn establisher(config: E2eConfig) -> SessionEstablisher {
    SessionEstablisher::new(config, Resolver::default())
}

fn login_page() -> FakePage {
    FakePage::new()
        .element(FakeElement::new("input[type=\"email\"]"))
        .element(FakeElement::new("input[type=\"password\"]"))
        .element(FakeElement::new(SUBMIT).text("Sign in"))
}

fn dashboard() -> FakePage {
    FakePage::new().body("Welcome back")
}

/// An app whose submit button goes straight to the dashboard
fn plain_app() -> FakeSurface {
    FakeSurface::new()
        .route("/login", login_page())
        .route("/dashboard", dashboard())
        .route("/upload", dashboard())
        .on_click(SUBMIT, vec![Change::navigate("/dashboard")])
        .with_cookies(vec![session_cookie()])
}

fn saved_snapshot(config: &E2eConfig) -> SnapshotStore {
    let store = SnapshotStore::new(config.storage_state_path.clone());
    store
        .save(&StorageState {
            cookies: vec![session_cookie()],
            origins: Vec::new(),
        })
        .unwrap();
    store
}

// ============================================================================
// Saved session
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_valid_snapshot_skips_login() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    saved_snapshot(&config);
    let surface = plain_app();

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::SavedSession);
    let log = surface.log();
    assert_eq!(log.cookies_added, 1);
    assert_eq!(log.visits, vec!["/upload"]);
    assert!(log.fills.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expired_snapshot_falls_back_to_one_fresh_login() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = saved_snapshot(&config);
    let surface = plain_app().route("/upload", FakePage::new().redirect_to("/login"));

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    let log = surface.log();
    assert_eq!(log.visits.iter().filter(|v| *v == "/upload").count(), 1);
    assert_eq!(log.cookies_added, 1);
    // Replaced by the snapshot of the fresh login
    assert!(store.exists());
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_snapshot_means_fresh_login() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    std::fs::create_dir_all(config.storage_state_path.parent().unwrap()).unwrap();
    std::fs::write(&config.storage_state_path, "{ not json").unwrap();
    let surface = plain_app();

    let path = establisher(config.clone()).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    assert_eq!(surface.log().cookies_added, 0);
    let saved = SnapshotStore::new(config.storage_state_path).load().unwrap();
    assert_eq!(saved.cookies.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reuse_disabled_ignores_snapshot() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    saved_snapshot(&config);
    config.reuse_session = false;
    let surface = plain_app();

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    assert_eq!(surface.log().cookies_added, 0);
}

// ============================================================================
// Fresh login
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fresh_login_fills_form_and_saves_snapshot() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = SnapshotStore::new(config.storage_state_path.clone());
    let surface = plain_app();

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    let log = surface.log();
    assert_eq!(
        log.fills,
        vec![
            ("input[type=\"email\"]".to_string(), EMAIL.to_string()),
            ("input[type=\"password\"]".to_string(), PASSWORD.to_string()),
        ]
    );
    assert_eq!(log.clicks, vec![(SUBMIT.to_string(), false)]);
    assert_eq!(store.load().unwrap().cookies[0].name, "session");
}

#[tokio::test(start_paused = true)]
async fn test_cookie_banner_is_dismissed_before_login() {
    let dir = TempDir::new().unwrap();
    let accept = "[data-testid=\"cookie-accept\"]";
    let surface = plain_app()
        .route(
            "/login",
            login_page().element(FakeElement::new(accept).text("Accept")),
        )
        .on_click(accept, vec![Change::Hide(accept.to_string())]);

    establisher(config(&dir)).establish(&surface).await.unwrap();

    assert_eq!(surface.log().clicks[0], (accept.to_string(), false));
}

#[tokio::test(start_paused = true)]
async fn test_login_form_on_fallback_path() {
    let dir = TempDir::new().unwrap();
    let surface = FakeSurface::new()
        .route("/auth/login", login_page())
        .route("/dashboard", dashboard())
        .on_click(SUBMIT, vec![Change::navigate("/dashboard")]);
    let establisher = establisher(config(&dir));

    let path = establisher.navigate_to_login(&surface).await.unwrap();

    assert_eq!(path, "/auth/login");
    assert_eq!(surface.log().visits, vec!["/login", "/auth/login"]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_credentials() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.credentials = Credentials::default();
    let surface = plain_app();

    let err = establisher(config).establish(&surface).await.unwrap_err();

    assert!(matches!(err, Error::MissingCredentials));
    assert!(!err.is_stage_exhaustion());
    assert!(surface.log().fills.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_login_form_not_found_names_every_path() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let expected = config.candidate_login_paths();
    let surface = FakeSurface::new();
    let timings = LoginTimings::default()
        .with_probe_deadline(Duration::from_secs(60), Duration::from_millis(500));

    let err = establisher(config)
        .with_timings(timings)
        .establish(&surface)
        .await
        .unwrap_err();

    match err {
        Error::LoginFormNotFound { paths, base_url } => {
            assert_eq!(paths, expected);
            assert_eq!(base_url, "https://app.test/");
        }
        other => panic!("expected LoginFormNotFound, got {:?}", other),
    }
    let visits = surface.log().visits;
    assert_eq!(visits.len(), expected.len() + 1);
    assert_eq!(visits.last().map(String::as_str), Some("/"));
}

#[tokio::test(start_paused = true)]
async fn test_login_search_deadline_cuts_path_list_short() {
    let dir = TempDir::new().unwrap();
    let surface = FakeSurface::new();
    let timings = LoginTimings::default()
        .with_probe_deadline(Duration::from_secs(8), Duration::from_secs(5));

    let err = establisher(config(&dir))
        .with_timings(timings)
        .establish(&surface)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::LoginFormNotFound { .. }));
    // Two paths fit in the deadline, then the root is tried once
    assert_eq!(surface.log().visits, vec!["/login", "/auth/login", "/"]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_credentials_time_out_waiting_for_outcome() {
    let dir = TempDir::new().unwrap();
    let surface = plain_app().on_click(
        SUBMIT,
        vec![Change::Show(
            FakeElement::new("[role=\"alert\"]").text("Invalid email or password"),
        )],
    );
    let timings = LoginTimings::default().with_outcome(Duration::from_secs(3));

    let err = establisher(config(&dir))
        .with_timings(timings)
        .establish(&surface)
        .await
        .unwrap_err();

    match err {
        Error::LoginOutcomeTimeout { url, waited_ms } => {
            assert_eq!(url, "https://app.test/login");
            assert_eq!(waited_ms, 3000);
        }
        other => panic!("expected LoginOutcomeTimeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_login_redirect_naming_the_dashboard_is_not_signed_in() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let snapshot = config.storage_state_path.clone();
    let rejected = login_page().element(
        FakeElement::new("[role=\"alert\"]").text("Invalid email or password"),
    );
    let surface = plain_app()
        .route("/login?next=/upload", rejected)
        .on_click(SUBMIT, vec![Change::navigate("/login?next=/upload")]);
    let timings = LoginTimings::default().with_outcome(Duration::from_secs(3));

    let err = establisher(config)
        .with_timings(timings)
        .establish(&surface)
        .await
        .unwrap_err();

    match err {
        Error::LoginOutcomeTimeout { url, waited_ms } => {
            assert_eq!(url, "https://app.test/login?next=/upload");
            assert_eq!(waited_ms, 3000);
        }
        other => panic!("expected LoginOutcomeTimeout, got {:?}", other),
    }
    assert!(!SnapshotStore::new(snapshot).exists());
}

// ============================================================================
// Verification codes
// ============================================================================

fn otp_app(verify_page: FakePage) -> FakeSurface {
    plain_app()
        .route("/verify", verify_page)
        .on_click(SUBMIT, vec![Change::navigate("/verify")])
        .on_click(VERIFY, vec![Change::navigate("/dashboard")])
}

#[tokio::test(start_paused = true)]
async fn test_otp_single_field() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.otp_code = Some("246810".to_string());
    let surface = otp_app(
        FakePage::new()
            .element(FakeElement::new("input[name=\"code\"]"))
            .element(FakeElement::new(VERIFY).text("Verify")),
    );

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    let log = surface.log();
    assert!(log
        .fills
        .contains(&("input[name=\"code\"]".to_string(), "246810".to_string())));
    assert_eq!(log.clicks.last(), Some(&(VERIFY.to_string(), false)));
    assert_eq!(surface.current_path(), "/dashboard");
}

#[tokio::test(start_paused = true)]
async fn test_otp_split_fields_typed_one_character_at_a_time() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.otp_code = Some("246810".to_string());
    let surface = otp_app(
        FakePage::new()
            .element(FakeElement::new("internal:role=button[name=/verify/i]"))
            .element(FakeElement::new("input[name=\"digit1\"]"))
            .element(FakeElement::new(VERIFY).text("Verify")),
    );

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    let log = surface.log();
    assert_eq!(
        log.element_presses,
        vec![("input[name=\"digit1\"]".to_string(), "2".to_string())]
    );
    assert_eq!(log.key_presses, vec!["4", "6", "8", "1", "0"]);
}

#[tokio::test(start_paused = true)]
async fn test_otp_without_verify_button_presses_enter() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.otp_code = Some("246810".to_string());
    let surface = otp_app(FakePage::new().element(FakeElement::new("input[name=\"code\"]")))
        .on_key("Enter", vec![Change::navigate("/dashboard")]);

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    assert_eq!(surface.log().key_presses, vec!["Enter"]);
}

#[tokio::test(start_paused = true)]
async fn test_otp_falls_back_to_any_numeric_input() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.otp_code = Some("246810".to_string());
    let surface = otp_app(
        FakePage::new()
            .element(FakeElement::new("internal:role=button[name=/verify/i]"))
            .element(FakeElement::new("input[type=\"number\"]"))
            .element(FakeElement::new(VERIFY).text("Verify")),
    );

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    let log = surface.log();
    assert!(log
        .fills
        .contains(&("input[type=\"number\"]".to_string(), "246810".to_string())));
    assert!(log.element_presses.is_empty());
    assert_eq!(surface.current_path(), "/dashboard");
}

#[tokio::test(start_paused = true)]
async fn test_otp_without_any_field_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.otp_code = Some("246810".to_string());
    let surface = otp_app(
        FakePage::new().element(FakeElement::new("internal:role=button[name=/verify/i]")),
    );

    let err = establisher(config).establish(&surface).await.unwrap_err();

    match &err {
        Error::OtpEntryFailed { url } => assert_eq!(url, "https://app.test/verify"),
        other => panic!("expected OtpEntryFailed, got {:?}", other),
    }
    assert!(err.is_stage_exhaustion());
    assert!(surface.log().clicks.iter().all(|(key, _)| key != VERIFY));
}

#[tokio::test(start_paused = true)]
async fn test_code_accepted_but_no_dashboard_times_out() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.otp_code = Some("246810".to_string());
    let surface = otp_app(
        FakePage::new()
            .element(FakeElement::new("input[name=\"code\"]"))
            .element(FakeElement::new(VERIFY).text("Verify")),
    )
    .on_click(VERIFY, vec![]);
    let timings = LoginTimings::default().with_post_login(Duration::from_secs(10));

    let err = establisher(config.clone())
        .with_timings(timings)
        .establish(&surface)
        .await
        .unwrap_err();

    match err {
        Error::PostLoginTimeout { url, waited_ms } => {
            assert_eq!(url, "https://app.test/verify");
            assert_eq!(waited_ms, 10_000);
        }
        other => panic!("expected PostLoginTimeout, got {:?}", other),
    }
    assert_eq!(surface.log().clicks.last(), Some(&(VERIFY.to_string(), false)));
    assert!(!SnapshotStore::new(config.storage_state_path).exists());
}

#[tokio::test(start_paused = true)]
async fn test_code_mode_without_code_requires_verification() {
    let dir = TempDir::new().unwrap();
    let surface = otp_app(FakePage::new().element(FakeElement::new("input[name=\"code\"]")));

    let err = establisher(config(&dir)).establish(&surface).await.unwrap_err();

    assert!(matches!(err, Error::VerificationRequired));
    assert!(err.to_string().contains("E2E_OTP_MODE=manual"));
}

#[tokio::test(start_paused = true)]
async fn test_manual_otp_waits_for_human() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.otp_mode = OtpMode::Manual;
    let surface = otp_app(FakePage::new().element(FakeElement::new("input[name=\"code\"]")))
        .on_click(
            SUBMIT,
            vec![
                Change::navigate("/verify"),
                Change::after(Duration::from_secs(90), Change::navigate("/dashboard")),
            ],
        );

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::FreshLogin);
    assert!(surface.log().fills.iter().all(|(key, _)| key != "input[name=\"code\"]"));
}

#[tokio::test(start_paused = true)]
async fn test_manual_otp_gives_up_after_budget() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.otp_mode = OtpMode::Manual;
    let surface = otp_app(FakePage::new().element(FakeElement::new("input[name=\"code\"]")));
    let timings = LoginTimings::default().with_manual_otp(Duration::from_secs(10));

    let err = establisher(config)
        .with_timings(timings)
        .establish(&surface)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PostLoginTimeout { waited_ms: 10_000, .. }));
}

// ============================================================================
// Interactive login
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_interactive_login_prefills_and_hands_over() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.interactive_login = true;
    let surface = plain_app().on_pause(vec![Change::navigate("/dashboard")]);

    let path = establisher(config).establish(&surface).await.unwrap();

    assert_eq!(path, AuthPath::Interactive);
    let log = surface.log();
    assert_eq!(log.pauses, 1);
    assert!(log.clicks.is_empty());
    assert!(log.fills.contains(&("input[type=\"email\"]".to_string(), EMAIL.to_string())));
    assert!(log
        .fills
        .contains(&("input[type=\"password\"]".to_string(), PASSWORD.to_string())));
}
