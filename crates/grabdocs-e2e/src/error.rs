// Error types for grabdocs-e2e
//
// Transient absence of an element never surfaces as an Error: the resolver
// swallows per-check failures. Only stage exhaustion, failed assertions and
// configuration problems reach a test body.

use thiserror::Error;

/// Result type alias for grabdocs-e2e operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort a test
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration variable held a value that could not be interpreted
    #[error("Invalid configuration for {variable}: {message}")]
    Config { variable: String, message: String },

    /// Fresh login was required but no credentials were configured
    #[error("No credentials configured. Set E2E_EMAIL and E2E_PASSWORD.")]
    MissingCredentials,

    /// No candidate login path rendered an e-mail field
    #[error(
        "Login form not found. Tried paths {} on baseURL {base_url}. \
        Set E2E_BASE_URL if your app uses a different host or route.",
        paths.join(", ")
    )]
    LoginFormNotFound { paths: Vec<String>, base_url: String },

    /// After submitting credentials neither the dashboard nor an OTP prompt appeared
    #[error("Neither dashboard nor verification screen appeared within {waited_ms}ms (at '{url}')")]
    LoginOutcomeTimeout { url: String, waited_ms: u64 },

    /// The application asked for an OTP but the configured mode cannot supply one
    #[error(
        "Verification required. Set E2E_OTP_MODE=code with E2E_OTP_CODE, \
        or E2E_OTP_MODE=manual to enter code."
    )]
    VerificationRequired,

    /// No OTP field accepted the configured code
    #[error("OTP entry failed: no code field accepted input (at '{url}')")]
    OtpEntryFailed { url: String },

    /// Login finished but the browser never reached a protected route
    #[error("Post-login navigation never completed after {waited_ms}ms (at '{url}')")]
    PostLoginTimeout { url: String, waited_ms: u64 },

    /// Every candidate for a UI intent was exhausted
    #[error("{intent} not found. Tried: {}. Current URL: {url}. Last error: {last_error}", tried.join(", "))]
    NotFound {
        intent: String,
        tried: Vec<String>,
        url: String,
        last_error: String,
    },

    /// None of the accepted outcome signals was observed
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    /// Invalid argument provided to a method
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A test body exceeded the suite-level budget
    #[error("Test '{name}' exceeded its {timeout_ms}ms budget")]
    TestTimeout { name: String, timeout_ms: u64 },

    /// Persisted session snapshot could not be read or written
    #[error("Session snapshot error: {0}")]
    Snapshot(String),

    /// Error reported by the browser automation layer
    #[error("Browser error: {0}")]
    Browser(#[from] playwright_rs::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error with additional context
    #[error("{0}: {1}")]
    Context(String, #[source] Box<Error>),
}

impl Error {
    /// Adds context to the error
    pub fn context(self, msg: impl Into<String>) -> Self {
        Error::Context(msg.into(), Box::new(self))
    }

    /// Creates a configuration error for the named variable
    pub fn config(variable: &str, message: impl Into<String>) -> Self {
        Error::Config {
            variable: variable.to_string(),
            message: message.into(),
        }
    }

    /// Whether every strategy of a stage was tried without success.
    pub fn is_stage_exhaustion(&self) -> bool {
        match self {
            Error::LoginFormNotFound { .. }
            | Error::LoginOutcomeTimeout { .. }
            | Error::VerificationRequired
            | Error::OtpEntryFailed { .. }
            | Error::PostLoginTimeout { .. }
            | Error::NotFound { .. } => true,
            Error::Context(_, inner) => inner.is_stage_exhaustion(),
            _ => false,
        }
    }
}
