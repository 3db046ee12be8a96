// Session establishment
//
// Authenticates the browsing context before a test body runs. The flow is an
// explicit state machine: each stage observes the page and reports a
// StageEvent, and the pure `transition` function picks the next state. Only
// `Authenticated` and `Fatal` are terminal.
//
// Init -> CheckSavedSession -> LocateLoginForm -> SubmitCredentials
//      -> AwaitOutcome -> OtpRequired -> AwaitDashboard -> Authenticated | Fatal

pub mod otp;
pub mod snapshot;

pub use otp::{OtpEntry, OtpMethod, OtpTimings};
pub use snapshot::SnapshotStore;

use crate::config::{Credentials, E2eConfig, OtpMode};
use crate::error::{Error, Result};
use crate::locator::{Resolver, catalog};
use crate::outcome::{UrlPattern, is_signed_in_url, wait_for_url};
use crate::surface::{Surface, Target};
use std::time::Duration;
use tokio::time::Instant;

/// Protected route used to validate a saved session
pub const PROTECTED_ROUTE: &str = "/upload";

/// How the context became authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPath {
    /// A persisted snapshot was applied and accepted
    SavedSession,
    /// Credentials (and possibly an OTP) were submitted
    FreshLogin,
    /// A human completed the login in the live browser
    Interactive,
}

/// Why establishment stopped without authenticating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    MissingCredentials,
    LoginFormNotFound {
        paths: Vec<String>,
        base_url: String,
    },
    ControlMissing {
        intent: String,
        tried: Vec<String>,
        url: String,
        last_error: String,
    },
    NeitherOutcome {
        url: String,
        waited_ms: u64,
    },
    VerificationRequired,
    OtpEntryFailed {
        url: String,
    },
    PostLoginTimeout {
        url: String,
        waited_ms: u64,
    },
    UnexpectedEvent {
        state: &'static str,
        event: &'static str,
    },
}

impl From<FatalReason> for Error {
    fn from(reason: FatalReason) -> Self {
        match reason {
            FatalReason::MissingCredentials => Error::MissingCredentials,
            FatalReason::LoginFormNotFound { paths, base_url } => {
                Error::LoginFormNotFound { paths, base_url }
            }
            FatalReason::ControlMissing {
                intent,
                tried,
                url,
                last_error,
            } => Error::NotFound {
                intent,
                tried,
                url,
                last_error,
            },
            FatalReason::NeitherOutcome { url, waited_ms } => {
                Error::LoginOutcomeTimeout { url, waited_ms }
            }
            FatalReason::VerificationRequired => Error::VerificationRequired,
            FatalReason::OtpEntryFailed { url } => Error::OtpEntryFailed { url },
            FatalReason::PostLoginTimeout { url, waited_ms } => {
                Error::PostLoginTimeout { url, waited_ms }
            }
            FatalReason::UnexpectedEvent { state, event } => Error::AssertionFailed(format!(
                "login received '{}' while in '{}'",
                event, state
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    CheckSavedSession,
    LocateLoginForm,
    SubmitCredentials,
    AwaitOutcome,
    OtpRequired,
    AwaitDashboard(AuthPath),
    Authenticated(AuthPath),
    Fatal(FatalReason),
}

impl LoginState {
    /// Entry state: the saved session is only checked when one may be used
    pub fn initial(saved_session_available: bool) -> Self {
        if saved_session_available {
            LoginState::CheckSavedSession
        } else {
            LoginState::LocateLoginForm
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoginState::Authenticated(_) | LoginState::Fatal(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoginState::CheckSavedSession => "CheckSavedSession",
            LoginState::LocateLoginForm => "LocateLoginForm",
            LoginState::SubmitCredentials => "SubmitCredentials",
            LoginState::AwaitOutcome => "AwaitOutcome",
            LoginState::OtpRequired => "OtpRequired",
            LoginState::AwaitDashboard(_) => "AwaitDashboard",
            LoginState::Authenticated(_) => "Authenticated",
            LoginState::Fatal(_) => "Fatal",
        }
    }
}

/// What a stage observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    SnapshotAccepted,
    /// Snapshot missing, unreadable, or redirected to a login surface
    SnapshotRejected,
    FormLocated,
    FormNotFound {
        paths: Vec<String>,
        base_url: String,
    },
    CredentialsSubmitted,
    CredentialsMissing,
    ControlMissing {
        intent: String,
        tried: Vec<String>,
        url: String,
        last_error: String,
    },
    /// Interactive mode: the form is prefilled and a human takes over
    HandedToUser,
    DashboardReached,
    OtpPromptShown,
    OutcomeTimedOut {
        url: String,
        waited_ms: u64,
    },
    OtpSubmitted,
    /// Code mode without a configured code
    OtpUnavailable,
    OtpEntryFailed {
        url: String,
    },
    DashboardTimedOut {
        url: String,
        waited_ms: u64,
    },
}

impl StageEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StageEvent::SnapshotAccepted => "SnapshotAccepted",
            StageEvent::SnapshotRejected => "SnapshotRejected",
            StageEvent::FormLocated => "FormLocated",
            StageEvent::FormNotFound { .. } => "FormNotFound",
            StageEvent::CredentialsSubmitted => "CredentialsSubmitted",
            StageEvent::CredentialsMissing => "CredentialsMissing",
            StageEvent::ControlMissing { .. } => "ControlMissing",
            StageEvent::HandedToUser => "HandedToUser",
            StageEvent::DashboardReached => "DashboardReached",
            StageEvent::OtpPromptShown => "OtpPromptShown",
            StageEvent::OutcomeTimedOut { .. } => "OutcomeTimedOut",
            StageEvent::OtpSubmitted => "OtpSubmitted",
            StageEvent::OtpUnavailable => "OtpUnavailable",
            StageEvent::OtpEntryFailed { .. } => "OtpEntryFailed",
            StageEvent::DashboardTimedOut { .. } => "DashboardTimedOut",
        }
    }
}

/// Next state for `event` observed in `state`.
///
/// Terminal states absorb every event. Nothing leads back into
/// `CheckSavedSession`, so a rejected snapshot falls back to a fresh login
/// exactly once.
pub fn transition(state: LoginState, event: StageEvent) -> LoginState {
    use LoginState as S;
    use StageEvent as E;

    match (state, event) {
        (s, _) if s.is_terminal() => s,

        (S::CheckSavedSession, E::SnapshotAccepted) => S::Authenticated(AuthPath::SavedSession),
        (S::CheckSavedSession, E::SnapshotRejected) => S::LocateLoginForm,

        (S::LocateLoginForm, E::FormLocated) => S::SubmitCredentials,
        (S::LocateLoginForm, E::FormNotFound { paths, base_url }) => {
            S::Fatal(FatalReason::LoginFormNotFound { paths, base_url })
        }

        (S::SubmitCredentials, E::CredentialsSubmitted) => S::AwaitOutcome,
        (S::SubmitCredentials, E::CredentialsMissing) => S::Fatal(FatalReason::MissingCredentials),
        (S::SubmitCredentials, E::HandedToUser) => S::AwaitDashboard(AuthPath::Interactive),
        (
            S::SubmitCredentials,
            E::ControlMissing {
                intent,
                tried,
                url,
                last_error,
            },
        ) => S::Fatal(FatalReason::ControlMissing {
            intent,
            tried,
            url,
            last_error,
        }),

        (S::AwaitOutcome, E::DashboardReached) => S::Authenticated(AuthPath::FreshLogin),
        (S::AwaitOutcome, E::OtpPromptShown) => S::OtpRequired,
        (S::AwaitOutcome, E::OutcomeTimedOut { url, waited_ms }) => {
            S::Fatal(FatalReason::NeitherOutcome { url, waited_ms })
        }

        (S::OtpRequired, E::OtpSubmitted) => S::AwaitDashboard(AuthPath::FreshLogin),
        (S::OtpRequired, E::DashboardReached) => S::Authenticated(AuthPath::FreshLogin),
        (S::OtpRequired, E::OtpUnavailable) => S::Fatal(FatalReason::VerificationRequired),
        (S::OtpRequired, E::OtpEntryFailed { url }) => {
            S::Fatal(FatalReason::OtpEntryFailed { url })
        }
        (S::OtpRequired, E::DashboardTimedOut { url, waited_ms }) => {
            S::Fatal(FatalReason::PostLoginTimeout { url, waited_ms })
        }

        (S::AwaitDashboard(path), E::DashboardReached) => S::Authenticated(path),
        (S::AwaitDashboard(_), E::DashboardTimedOut { url, waited_ms }) => {
            S::Fatal(FatalReason::PostLoginTimeout { url, waited_ms })
        }

        (s, e) => S::Fatal(FatalReason::UnexpectedEvent {
            state: s.name(),
            event: e.name(),
        }),
    }
}

/// Time budgets for each login stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginTimings {
    /// Pause after navigating with a saved session, before reading the URL
    pub saved_session_settle: Duration,
    /// Shared deadline for trying login paths
    pub probe_deadline: Duration,
    /// E-mail field lookup on each candidate path
    pub per_path_probe: Duration,
    /// Lookup of each login form control
    pub form_field: Duration,
    pub outcome: Duration,
    pub outcome_interval: Duration,
    pub manual_otp: Duration,
    pub post_login: Duration,
    pub interactive_prefill: Duration,
    pub interactive_wait: Duration,
    pub otp: OtpTimings,
}

impl Default for LoginTimings {
    fn default() -> Self {
        Self {
            saved_session_settle: Duration::from_secs(2),
            probe_deadline: Duration::from_secs(8),
            per_path_probe: Duration::from_secs(5),
            form_field: Duration::from_secs(3),
            outcome: Duration::from_secs(20),
            outcome_interval: Duration::from_millis(250),
            manual_otp: Duration::from_secs(5 * 60),
            post_login: Duration::from_secs(3 * 60),
            interactive_prefill: Duration::from_secs(20),
            interactive_wait: Duration::from_secs(5 * 60),
            otp: OtpTimings::default(),
        }
    }
}

impl LoginTimings {
    pub fn with_outcome(mut self, timeout: Duration) -> Self {
        self.outcome = timeout;
        self
    }

    pub fn with_post_login(mut self, timeout: Duration) -> Self {
        self.post_login = timeout;
        self
    }

    pub fn with_manual_otp(mut self, timeout: Duration) -> Self {
        self.manual_otp = timeout;
        self
    }

    pub fn with_probe_deadline(mut self, deadline: Duration, per_path: Duration) -> Self {
        self.probe_deadline = deadline;
        self.per_path_probe = per_path;
        self
    }
}

/// Drives the login state machine against one surface.
#[derive(Debug, Clone)]
pub struct SessionEstablisher {
    config: E2eConfig,
    resolver: Resolver,
    timings: LoginTimings,
    store: SnapshotStore,
}

impl SessionEstablisher {
    pub fn new(config: E2eConfig, resolver: Resolver) -> Self {
        let store = SnapshotStore::new(config.storage_state_path.clone());
        Self {
            config,
            resolver,
            timings: LoginTimings::default(),
            store,
        }
    }

    pub fn with_timings(mut self, timings: LoginTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn config(&self) -> &E2eConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn timings(&self) -> &LoginTimings {
        &self.timings
    }

    /// Authenticates the surface's context or fails with a stage-exhaustion error.
    pub async fn establish(&self, surface: &dyn Surface) -> Result<AuthPath> {
        let saved = self.config.reuse_session && self.store.exists();
        let mut state = LoginState::initial(saved);

        loop {
            tracing::info!("Login stage: {}", state.name());
            let event = match &state {
                LoginState::CheckSavedSession => self.check_saved_session(surface).await,
                LoginState::LocateLoginForm => self.locate_login_form(surface).await,
                LoginState::SubmitCredentials => self.submit_credentials(surface).await?,
                LoginState::AwaitOutcome => self.await_outcome(surface).await,
                LoginState::OtpRequired => self.otp_required(surface).await?,
                LoginState::AwaitDashboard(path) => self.await_dashboard(surface, *path).await,
                LoginState::Authenticated(path) => {
                    let path = *path;
                    if path != AuthPath::SavedSession && self.config.reuse_session {
                        self.persist(surface).await;
                    }
                    tracing::info!("Authenticated via {:?} at {}", path, surface.url());
                    return Ok(path);
                }
                LoginState::Fatal(reason) => {
                    tracing::warn!("Login failed: {:?}", reason);
                    return Err(reason.clone().into());
                }
            };
            tracing::debug!("Login event: {}", event.name());
            state = transition(state, event);
        }
    }

    async fn check_saved_session(&self, surface: &dyn Surface) -> StageEvent {
        let state = match self.store.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Error loading saved state, logging in fresh: {}", e);
                return StageEvent::SnapshotRejected;
            }
        };
        tracing::info!("Using saved authentication state ({} cookies)", state.cookies.len());

        if let Err(e) = surface.add_cookies(&state.cookies).await {
            tracing::warn!("Saved cookies were not accepted, logging in fresh: {}", e);
            return StageEvent::SnapshotRejected;
        }
        if let Err(e) = surface.goto(&self.config.url_for(PROTECTED_ROUTE)).await {
            tracing::warn!("Could not open {} with saved state: {}", PROTECTED_ROUTE, e);
            return StageEvent::SnapshotRejected;
        }
        tokio::time::sleep(self.timings.saved_session_settle).await;

        if UrlPattern::login_surface().is_match(&surface.url()) {
            tracing::warn!("Saved authentication state expired, logging in again");
            if let Err(e) = self.store.invalidate() {
                tracing::warn!("Could not remove expired snapshot: {}", e);
            }
            return StageEvent::SnapshotRejected;
        }
        tracing::info!("Saved authentication state is valid, skipping login");
        StageEvent::SnapshotAccepted
    }

    async fn locate_login_form(&self, surface: &dyn Surface) -> StageEvent {
        match self.navigate_to_login(surface).await {
            Ok(_) => StageEvent::FormLocated,
            Err(Error::LoginFormNotFound { paths, base_url }) => {
                StageEvent::FormNotFound { paths, base_url }
            }
            Err(e) => {
                tracing::warn!("Login form lookup failed: {}", e);
                StageEvent::FormNotFound {
                    paths: self.config.candidate_login_paths(),
                    base_url: self.config.base_url.to_string(),
                }
            }
        }
    }

    async fn submit_credentials(&self, surface: &dyn Surface) -> Result<StageEvent> {
        if self.config.interactive_login {
            self.prefill_login(surface, &self.config.credentials).await;
            tracing::info!("Handing the login form to the user");
            surface.pause().await?;
            return Ok(StageEvent::HandedToUser);
        }
        if !self.config.credentials.is_complete() {
            return Ok(StageEvent::CredentialsMissing);
        }
        match self.fill_login_form(surface, &self.config.credentials).await {
            Ok(()) => Ok(StageEvent::CredentialsSubmitted),
            Err(Error::NotFound {
                intent,
                tried,
                url,
                last_error,
            }) => Ok(StageEvent::ControlMissing {
                intent,
                tried,
                url,
                last_error,
            }),
            Err(e) => Err(e.context("Submitting credentials")),
        }
    }

    async fn await_outcome(&self, surface: &dyn Surface) -> StageEvent {
        let prompt = catalog::otp_prompt();
        let deadline = Instant::now() + self.timings.outcome;

        loop {
            if is_signed_in_url(&surface.url()) {
                return StageEvent::DashboardReached;
            }
            if self
                .resolver
                .wait_for_any(surface, &prompt, Duration::ZERO)
                .await
                .is_ok()
            {
                tracing::info!("Verification screen detected");
                return StageEvent::OtpPromptShown;
            }
            let now = Instant::now();
            if now >= deadline {
                return StageEvent::OutcomeTimedOut {
                    url: surface.url(),
                    waited_ms: self.timings.outcome.as_millis() as u64,
                };
            }
            tokio::time::sleep(self.timings.outcome_interval.min(deadline - now)).await;
        }
    }

    async fn otp_required(&self, surface: &dyn Surface) -> Result<StageEvent> {
        match self.config.otp_mode {
            OtpMode::Manual => {
                tracing::info!(
                    "Waiting up to {:?} for the code to be entered in the browser",
                    self.timings.manual_otp
                );
                Ok(self
                    .wait_dashboard(surface, self.timings.manual_otp)
                    .await)
            }
            OtpMode::Code => {
                let Some(code) = self.config.otp_code.as_deref().filter(|c| !c.is_empty()) else {
                    return Ok(StageEvent::OtpUnavailable);
                };
                let entry = OtpEntry::new(&self.resolver, &self.timings.otp);
                match entry.submit(surface, code).await {
                    Ok(_) => Ok(StageEvent::OtpSubmitted),
                    Err(Error::OtpEntryFailed { url }) => Ok(StageEvent::OtpEntryFailed { url }),
                    Err(e) => Err(e.context("Entering verification code")),
                }
            }
        }
    }

    async fn await_dashboard(&self, surface: &dyn Surface, path: AuthPath) -> StageEvent {
        let budget = match path {
            AuthPath::Interactive => self.timings.interactive_wait,
            _ => self.timings.post_login,
        };
        self.wait_dashboard(surface, budget).await
    }

    async fn wait_dashboard(&self, surface: &dyn Surface, budget: Duration) -> StageEvent {
        let reached = wait_for_url(
            surface,
            &UrlPattern::dashboard_or_upload(),
            budget,
            self.timings.outcome_interval,
        )
        .await;
        if reached {
            StageEvent::DashboardReached
        } else {
            StageEvent::DashboardTimedOut {
                url: surface.url(),
                waited_ms: budget.as_millis() as u64,
            }
        }
    }

    async fn persist(&self, surface: &dyn Surface) {
        let saved = match surface.storage_state().await {
            Ok(state) => self.store.save(&state),
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            tracing::warn!("Failed to save authentication state: {}", e);
        }
    }

    /// Opens the first candidate login path that renders an e-mail field.
    ///
    /// Returns the path that worked. Paths are tried under one shared
    /// deadline, then `/` is tried once more.
    pub async fn navigate_to_login(&self, surface: &dyn Surface) -> Result<String> {
        let paths = self.config.candidate_login_paths();
        let email = catalog::login_email(&self.config.selector_overrides);
        let deadline = Instant::now() + self.timings.probe_deadline;

        for path in &paths {
            if Instant::now() > deadline {
                tracing::debug!("Login search deadline reached before {}", path);
                break;
            }
            if self.email_field_at(surface, path, &email).await {
                return Ok(path.clone());
            }
        }

        if self.email_field_at(surface, "/", &email).await {
            return Ok("/".to_string());
        }

        Err(Error::LoginFormNotFound {
            paths,
            base_url: self.config.base_url.to_string(),
        })
    }

    async fn email_field_at(
        &self,
        surface: &dyn Surface,
        path: &str,
        email: &crate::locator::Candidates,
    ) -> bool {
        match surface.goto(&self.config.url_for(path)).await {
            Ok(Some(status)) if status >= 400 => {
                tracing::debug!("{} answered {}", path, status);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path, e);
                return false;
            }
        }
        self.dismiss_cookie_banner(surface).await;
        match self
            .resolver
            .wait_for_any(surface, email, self.timings.per_path_probe)
            .await
        {
            Ok(selector) => {
                tracing::info!("Login form found at {} ({})", path, selector);
                true
            }
            Err(_) => false,
        }
    }

    /// Fills e-mail and password and clicks submit.
    pub async fn fill_login_form(
        &self,
        surface: &dyn Surface,
        credentials: &Credentials,
    ) -> Result<()> {
        let overrides = &self.config.selector_overrides;
        let budget = self.timings.form_field;

        let email = self
            .resolver
            .resolve(surface, &catalog::login_email(overrides), budget)
            .await?;
        let password = self
            .resolver
            .resolve(surface, &catalog::login_password(overrides), budget)
            .await?;
        surface.fill(&email, &credentials.email).await?;
        surface.fill(&password, &credentials.password).await?;

        let submit = self
            .resolver
            .resolve(surface, &catalog::login_submit(overrides), budget)
            .await?;
        surface.click(&submit, false).await?;
        tracing::info!("Credentials submitted");
        Ok(())
    }

    /// Clicks the first visible cookie-consent button, if any.
    pub async fn dismiss_cookie_banner(&self, surface: &dyn Surface) -> bool {
        for selector in catalog::cookie_banner().selectors() {
            let button = Target::main(selector.as_str()).first();
            if self.resolver.probe(surface, &button).await {
                if let Err(e) = surface.click(&button, false).await {
                    tracing::debug!("Cookie banner click failed: {}", e);
                }
                tracing::debug!("Dismissed cookie banner via {}", selector);
                return true;
            }
        }
        false
    }

    // Keeps the fields filled while the page settles; some login pages
    // refresh and clear them shortly after loading.
    async fn prefill_login(&self, surface: &dyn Surface, credentials: &Credentials) {
        if !credentials.is_complete() {
            tracing::info!("No credentials configured, leaving the form empty");
            return;
        }
        let overrides = &self.config.selector_overrides;
        let until = Instant::now() + self.timings.interactive_prefill;
        let lookup = Duration::from_secs(2);
        let mut email_done = false;
        let mut password_done = false;

        while Instant::now() < until && !(email_done && password_done) {
            self.dismiss_cookie_banner(surface).await;

            if let Ok(field) = self
                .resolver
                .resolve(surface, &catalog::login_email(overrides), lookup)
                .await
            {
                let current = surface.input_value(&field).await.unwrap_or_default();
                if current != credentials.email {
                    let _ = surface.fill(&field, &credentials.email).await;
                }
                email_done = true;
            }
            if let Ok(field) = self
                .resolver
                .resolve(surface, &catalog::login_password(overrides), lookup)
                .await
            {
                let current = surface.input_value(&field).await.unwrap_or_default();
                if current.is_empty() {
                    let _ = surface.fill(&field, &credentials.password).await;
                }
                password_done = true;
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
    }
}
