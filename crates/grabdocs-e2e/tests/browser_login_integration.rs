// Integration tests with a real browser against the local test server
//
// These need the Playwright driver and Chromium installed. When the browser
// cannot be launched the test prints why and returns early.

use grabdocs_e2e::config::{Credentials, E2eConfig};
use grabdocs_e2e::flows::{auth, files, security};
use grabdocs_e2e::session::AuthPath;
use grabdocs_e2e::{Error, Harness, init_tracing};
use tempfile::TempDir;

use test_server::{OTP_EMAIL, TEST_EMAIL, TEST_OTP, TEST_PASSWORD, TestServer};

fn local_config(server: &TestServer, snapshots: &TempDir) -> E2eConfig {
    E2eConfig {
        base_url: url::Url::parse(&server.url()).expect("test server URL"),
        credentials: Credentials::new(TEST_EMAIL, TEST_PASSWORD),
        reuse_session: false,
        storage_state_path: snapshots.path().join("storage-state.json"),
        ..Default::default()
    }
}

async fn launch(config: E2eConfig) -> Option<Harness> {
    match Harness::launch(config).await {
        Ok(harness) => Some(harness),
        Err(e) => {
            eprintln!("[TEST] Skipping: browser not available ({})", e);
            None
        }
    }
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_fresh_login_reaches_dashboard() {
    init_tracing();
    let server = TestServer::start().await;
    let snapshots = TempDir::new().unwrap();
    let Some(harness) = launch(local_config(&server, &snapshots)).await else {
        server.shutdown();
        return;
    };

    let path = harness.login().await.expect("login succeeds");
    assert_eq!(path, AuthPath::FreshLogin);
    assert!(harness.surface().url().ends_with("/dashboard"));

    harness.close().await.expect("Failed to close browser");
    server.shutdown();
}

#[tokio::test]
async fn test_login_with_verification_code() {
    init_tracing();
    let server = TestServer::start().await;
    let snapshots = TempDir::new().unwrap();
    let mut config = local_config(&server, &snapshots);
    config.credentials = Credentials::new(OTP_EMAIL, TEST_PASSWORD);
    config.otp_code = Some(TEST_OTP.to_string());
    let Some(harness) = launch(config).await else {
        server.shutdown();
        return;
    };

    let path = harness.login().await.expect("login with OTP succeeds");
    assert_eq!(path, AuthPath::FreshLogin);

    harness.close().await.expect("Failed to close browser");
    server.shutdown();
}

#[tokio::test]
async fn test_verification_without_code_is_reported() {
    init_tracing();
    let server = TestServer::start().await;
    let snapshots = TempDir::new().unwrap();
    let mut config = local_config(&server, &snapshots);
    config.credentials = Credentials::new(OTP_EMAIL, TEST_PASSWORD);
    let Some(harness) = launch(config).await else {
        server.shutdown();
        return;
    };

    let err = harness.login().await.unwrap_err();
    assert!(matches!(err, Error::VerificationRequired), "{}", err);

    harness.close().await.expect("Failed to close browser");
    server.shutdown();
}

#[tokio::test]
async fn test_saved_session_is_reused_by_next_run() {
    init_tracing();
    let server = TestServer::start().await;
    let snapshots = TempDir::new().unwrap();
    let mut config = local_config(&server, &snapshots);
    config.reuse_session = true;

    let Some(first) = launch(config.clone()).await else {
        server.shutdown();
        return;
    };
    assert_eq!(first.login().await.unwrap(), AuthPath::FreshLogin);
    first.close().await.expect("Failed to close browser");
    assert!(config.storage_state_path.exists());

    let second = Harness::launch(config).await.expect("second launch");
    assert_eq!(second.login().await.unwrap(), AuthPath::SavedSession);
    second.close().await.expect("Failed to close browser");
    server.shutdown();
}

#[tokio::test]
async fn test_invalid_login_shows_error() {
    init_tracing();
    let server = TestServer::start().await;
    let snapshots = TempDir::new().unwrap();
    let Some(harness) = launch(local_config(&server, &snapshots)).await else {
        server.shutdown();
        return;
    };

    let ctx = harness.flow_context();
    let wrong = Credentials::new(TEST_EMAIL, "wrong-password");
    let report = auth::invalid_login_shows_error(&ctx, &harness.establisher(), &wrong)
        .await
        .expect("error is shown");
    assert!(report.signal.is_some());

    harness.close().await.expect("Failed to close browser");
    server.shutdown();
}

// ============================================================================
// Flows after login
// ============================================================================

#[tokio::test]
async fn test_files_search_and_preview() {
    init_tracing();
    let server = TestServer::start().await;
    let snapshots = TempDir::new().unwrap();
    let Some(harness) = launch(local_config(&server, &snapshots)).await else {
        server.shutdown();
        return;
    };
    harness.login().await.expect("login succeeds");
    let ctx = harness.flow_context();

    let search = files::search(&ctx, "sample").await.expect("search finds the sample");
    assert!(search.signal.is_some());

    let empty = files::search_empty_state(&ctx, files::NO_MATCH_TERM)
        .await
        .expect("empty search is accepted");
    assert!(!empty.is_skipped());

    let preview = files::preview_first_document(&ctx)
        .await
        .expect("document opens");
    assert!(preview.signal.is_some());

    harness.close().await.expect("Failed to close browser");
    server.shutdown();
}

#[tokio::test]
async fn test_unknown_route_and_logout() {
    init_tracing();
    let server = TestServer::start().await;
    let snapshots = TempDir::new().unwrap();
    let Some(harness) = launch(local_config(&server, &snapshots)).await else {
        server.shutdown();
        return;
    };
    harness.login().await.expect("login succeeds");
    let ctx = harness.flow_context();

    let unknown = security::unknown_route_handled(&ctx).await.expect("404 page");
    assert!(unknown.signal.is_some());

    ctx.open("/dashboard").await.expect("dashboard opens");
    let logout = auth::logout(&ctx).await.expect("logout reaches login");
    assert!(!logout.is_skipped());
    assert!(harness.surface().url().ends_with("/login"));

    harness.close().await.expect("Failed to close browser");
    server.shutdown();
}
