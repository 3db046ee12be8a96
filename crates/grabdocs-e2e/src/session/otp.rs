// OTP entry
//
// Tries, in order: one combined code field, a one-digit-per-box widget typed a
// character at a time, and finally any visible text or number input. Then
// clicks the verify button, or presses Enter when there is none.

use crate::error::{Error, Result};
use crate::locator::{Candidates, Resolver, catalog};
use crate::surface::{Surface, Target};
use std::time::Duration;

/// Waits used while entering a one-time code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpTimings {
    /// Pause before looking for fields, while the OTP screen renders
    pub settle: Duration,
    pub single_field: Duration,
    /// Extra pause before each fallback strategy
    pub fallback_settle: Duration,
    /// Visibility budget for each split-field candidate
    pub split_field: Duration,
    /// Delay between typed characters
    pub keystroke: Duration,
    pub any_input: Duration,
    /// Pause after the code is in place
    pub after_fill: Duration,
    pub verify_button: Duration,
    /// Pause after submitting, while the app navigates
    pub after_submit: Duration,
}

impl Default for OtpTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            single_field: Duration::from_secs(13),
            fallback_settle: Duration::from_secs(2),
            split_field: Duration::from_secs(5),
            keystroke: Duration::from_millis(200),
            any_input: Duration::from_secs(10),
            after_fill: Duration::from_secs(1),
            verify_button: Duration::from_secs(13),
            after_submit: Duration::from_secs(3),
        }
    }
}

/// How the code was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpMethod {
    SingleField,
    SplitFields,
    AnyInput,
}

/// Enters a one-time code into whatever field the verification screen offers.
#[derive(Debug, Clone, Copy)]
pub struct OtpEntry<'a> {
    resolver: &'a Resolver,
    timings: &'a OtpTimings,
}

impl<'a> OtpEntry<'a> {
    pub fn new(resolver: &'a Resolver, timings: &'a OtpTimings) -> Self {
        Self { resolver, timings }
    }

    /// Enters `code` and submits it.
    ///
    /// Fails with [`Error::OtpEntryFailed`] when no field accepted the code.
    pub async fn submit(&self, surface: &dyn Surface, code: &str) -> Result<OtpMethod> {
        tokio::time::sleep(self.timings.settle).await;

        let method = self.enter(surface, code).await?;
        tracing::info!("OTP entered via {:?}", method);

        tokio::time::sleep(self.timings.after_fill).await;
        match self
            .resolver
            .resolve(surface, &catalog::otp_submit(), self.timings.verify_button)
            .await
        {
            Ok(button) => surface.click(&button, false).await?,
            Err(_) => {
                tracing::debug!("No verify button, pressing Enter");
                surface.press_key("Enter").await?;
            }
        }
        tokio::time::sleep(self.timings.after_submit).await;
        Ok(method)
    }

    async fn enter(&self, surface: &dyn Surface, code: &str) -> Result<OtpMethod> {
        if let Ok(field) = self
            .resolver
            .resolve(surface, &catalog::otp_single_field(), self.timings.single_field)
            .await
        {
            surface.fill(&field, code).await?;
            return Ok(OtpMethod::SingleField);
        }

        tokio::time::sleep(self.timings.fallback_settle).await;
        for selector in catalog::otp_split_fields().selectors() {
            let single = Candidates::new("OTP digit field", [selector.as_str()]);
            if let Ok(field) = self
                .resolver
                .resolve(surface, &single, self.timings.split_field)
                .await
            {
                self.type_slowly(surface, &field, code).await?;
                return Ok(OtpMethod::SplitFields);
            }
        }

        tokio::time::sleep(self.timings.fallback_settle).await;
        if let Ok(field) = self
            .resolver
            .resolve(surface, &catalog::otp_any_text_input(), self.timings.any_input)
            .await
        {
            surface.fill(&field, code).await?;
            return Ok(OtpMethod::AnyInput);
        }

        Err(Error::OtpEntryFailed { url: surface.url() })
    }

    // Only the first keystroke targets the field. Split widgets move focus to
    // the next box themselves.
    async fn type_slowly(&self, surface: &dyn Surface, field: &Target, code: &str) -> Result<()> {
        for (i, ch) in code.chars().enumerate() {
            let key = ch.to_string();
            if i == 0 {
                surface.press(field, &key).await?;
            } else {
                surface.press_key(&key).await?;
            }
            tokio::time::sleep(self.timings.keystroke).await;
        }
        Ok(())
    }
}
