// Candidate lists for the intents shared across the suite
//
// Lists are ordered from most to least specific. Feature-specific lists live
// next to the flow that uses them.

use super::Candidates;
use crate::config::SelectorOverrides;

/// Role selector for a button whose accessible name matches `pattern` (a JS regex literal body)
pub fn role_button(pattern: &str) -> String {
    format!("internal:role=button[name=/{}/i]", pattern)
}

/// Text selector for elements whose text matches `pattern` case-insensitively
pub fn text_matching(pattern: &str) -> String {
    format!("internal:text=/{}/i", pattern)
}

/// Text selector for elements containing `text`, case-insensitively
pub fn text_containing(text: &str) -> String {
    format!("internal:text=\"{}\"i", text.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn login_email(overrides: &SelectorOverrides) -> Candidates {
    Candidates::sanitized(
        "login e-mail field",
        [
            overrides.email.as_deref().unwrap_or(""),
            "[data-testid=\"login-email\"]",
            "input[type=\"email\"]",
            "input[name=\"email\"]",
            "#email",
            "input[autocomplete=\"username\"]",
        ],
    )
}

pub fn login_password(overrides: &SelectorOverrides) -> Candidates {
    Candidates::sanitized(
        "login password field",
        [
            overrides.password.as_deref().unwrap_or(""),
            "[data-testid=\"login-password\"]",
            "input[type=\"password\"]",
            "input[name=\"password\"]",
            "#password",
            "input[autocomplete=\"current-password\"]",
        ],
    )
}

pub fn login_submit(overrides: &SelectorOverrides) -> Candidates {
    Candidates::sanitized(
        "login submit button",
        [
            overrides.submit.as_deref().unwrap_or(""),
            "[data-testid=\"login-submit\"]",
            "button[type=\"submit\"]",
            "button:has-text(\"Sign in\")",
            "button:has-text(\"Log in\")",
            "button:has-text(\"Continue\")",
            "[role=\"button\"]:has-text(\"Sign in\")",
        ],
    )
}

/// Markers of the verification screen shown after credentials
pub fn otp_prompt() -> Candidates {
    Candidates::new(
        "verification prompt",
        [
            "input[name=\"code\"]".to_string(),
            "input[autocomplete=\"one-time-code\"]".to_string(),
            role_button("verify"),
        ],
    )
}

pub fn otp_single_field() -> Candidates {
    Candidates::sanitized(
        "OTP code field",
        [
            "input[name=\"code\"]",
            "input[autocomplete=\"one-time-code\"]",
            "input[data-testid=\"otp-code\"]",
            "input[type=\"text\"][maxlength=\"6\"]",
            "input[type=\"text\"][maxlength=\"8\"]",
            "input[placeholder*=\"code\" i]",
            "input[placeholder*=\"verification\" i]",
            "input[inputmode=\"numeric\"]",
        ],
    )
}

/// First field of a one-digit-per-box OTP widget
pub fn otp_split_fields() -> Candidates {
    Candidates::sanitized(
        "OTP digit fields",
        [
            "input[name=\"digit1\"]",
            "input[name=\"otp1\"]",
            "input[data-testid=\"otp-1\"]",
        ],
    )
}

/// Any plausible text input, the last resort for OTP entry
pub fn otp_any_text_input() -> Candidates {
    Candidates::new(
        "numeric text input",
        ["input[type=\"text\"]", "input[type=\"number\"]"],
    )
}

pub fn otp_submit() -> Candidates {
    Candidates::sanitized(
        "OTP verify button",
        [
            "button:has-text(\"Verify\")",
            "button:has-text(\"Continue\")",
            "button:has-text(\"Confirm\")",
            "[data-testid=\"otp-submit\"]",
        ],
    )
}

pub fn cookie_banner() -> Candidates {
    Candidates::new(
        "cookie consent button",
        [
            "[data-testid=\"cookie-accept\"]",
            "#onetrust-accept-btn-handler",
            "button:has-text(\"Accept\")",
            "button:has-text(\"I agree\")",
            "button:has-text(\"Got it\")",
        ],
    )
}

/// Alert-like containers and error wording after a rejected login
pub fn login_error() -> Candidates {
    Candidates::new(
        "login error message",
        [
            "[role=\"alert\"]".to_string(),
            "[data-testid*=\"toast\"]".to_string(),
            "[class*=\"error\"]".to_string(),
            "[class*=\"alert\"]".to_string(),
            text_matching("invalid|error|incorrect|failed"),
        ],
    )
}

pub fn logout() -> Candidates {
    Candidates::new(
        "logout control",
        [
            "[data-testid=\"logout\"]".to_string(),
            "button:has-text(\"Log out\")".to_string(),
            "button:has-text(\"Logout\")".to_string(),
            "button:has-text(\"Sign out\")".to_string(),
            role_button("log ?out|sign ?out"),
        ],
    )
}

/// Modal containers; flows scope their form lookups to one when it is open
pub fn modal() -> Candidates {
    Candidates::new(
        "modal dialog",
        [
            "[role=\"dialog\"]",
            "[class*=\"modal\"]",
            "[class*=\"dialog\"]",
            ".fixed.inset-0",
        ],
    )
}

pub fn success_toast() -> Candidates {
    Candidates::new(
        "success toast",
        [
            "[data-testid=\"toast-success\"]".to_string(),
            "[class*=\"toast\"]".to_string(),
            text_matching("created|success|saved"),
        ],
    )
}
