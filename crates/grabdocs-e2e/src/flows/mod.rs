// Feature flows
//
// Each flow opens a route, finds its controls through the Resolver (falling
// back to a KeywordScan), acts, and verifies with an Outcome. Create-style
// features share one driver, CreateAndVerify, and differ only in data.

pub mod analytics;
pub mod auth;
pub mod calendar;
pub mod chat;
pub mod chat_history;
pub mod files;
pub mod forms;
pub mod links;
pub mod meetings;
pub mod perf;
pub mod security;
pub mod workspaces;

use crate::config::E2eConfig;
use crate::error::{Error, Result};
use crate::locator::{Candidates, KeywordRule, KeywordScan, Resolver, catalog};
use crate::outcome::{Outcome, wait_until_gone};
use crate::surface::{Surface, Target};
use std::time::Duration;

/// Result of one flow: the winning signal, or why the flow was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowReport {
    pub name: String,
    pub signal: Option<String>,
    pub skipped: Option<String>,
}

impl FlowReport {
    pub fn passed(name: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signal: Some(signal.into()),
            skipped: None,
        }
    }

    /// An optional affordance was absent; not a failure
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let report = Self {
            name: name.into(),
            signal: None,
            skipped: Some(reason.into()),
        };
        tracing::warn!(
            "{} skipped: {}",
            report.name,
            report.skipped.as_deref().unwrap_or_default()
        );
        report
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Waits used by feature flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimings {
    /// Pause after navigation while the page renders
    pub settle: Duration,
    /// Budget for locating a control
    pub control: Duration,
    /// Budget for noticing an open modal
    pub scope: Duration,
    /// Pause after a click or submit
    pub after_action: Duration,
    /// Budget for the accepted outcome signals
    pub verify: Duration,
    pub download: Duration,
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(3),
            control: Duration::from_secs(5),
            scope: Duration::from_secs(3),
            after_action: Duration::from_secs(3),
            verify: Duration::from_secs(10),
            download: Duration::from_secs(10),
        }
    }
}

/// Everything a flow needs: the page, where the app lives, and how long to wait.
#[derive(Clone, Copy)]
pub struct FlowContext<'a> {
    pub surface: &'a dyn Surface,
    pub config: &'a E2eConfig,
    pub resolver: Resolver,
    pub timings: FlowTimings,
}

impl<'a> FlowContext<'a> {
    pub fn new(surface: &'a dyn Surface, config: &'a E2eConfig) -> Self {
        Self {
            surface,
            config,
            resolver: Resolver::default(),
            timings: FlowTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: FlowTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Navigates to an application route and lets it settle.
    pub async fn open(&self, route: &str) -> Result<Option<u16>> {
        let status = self.surface.goto(&self.config.url_for(route)).await?;
        self.settle().await;
        Ok(status)
    }

    pub async fn reload(&self) -> Result<()> {
        self.surface.reload().await?;
        self.settle().await;
        Ok(())
    }

    pub async fn settle(&self) {
        tokio::time::sleep(self.timings.settle).await;
    }

    pub async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Clicks the first visible control of a blocking dialog, if there is one.
    pub async fn dismiss(&self, control: &Candidates) -> Result<bool> {
        let Some(target) = self
            .resolver
            .try_resolve(self.surface, control, Duration::from_secs(2))
            .await
        else {
            return Ok(false);
        };
        tracing::info!("Dismissing {} via {}", control.intent(), target);
        self.surface.click(&target, false).await?;
        self.pause(Duration::from_secs(2)).await;
        Ok(true)
    }

    /// Clicks, retrying once with actionability checks off (overlays, animations).
    pub async fn click_lenient(&self, target: &Target) -> Result<()> {
        match self.surface.click(target, false).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!("Click on {} failed ({}), forcing", target, e);
                self.surface.click(target, true).await
            }
        }
    }

    /// First visible candidate, inside `scope` when given.
    pub async fn find(
        &self,
        scope: Option<&Target>,
        candidates: &Candidates,
        timeout: Duration,
    ) -> Result<Target> {
        match scope {
            Some(root) => {
                self.resolver
                    .resolve_within(self.surface, root, candidates, timeout)
                    .await
            }
            None => self.resolver.resolve(self.surface, candidates, timeout).await,
        }
    }

    /// Candidates first, then the scan.
    pub async fn find_or_scan(
        &self,
        scope: Option<&Target>,
        candidates: &Candidates,
        scan: Option<&KeywordScan>,
    ) -> Result<Target> {
        match self.find(scope, candidates, self.timings.control).await {
            Ok(target) => Ok(target),
            Err(err) => {
                let Some(scan) = scan else {
                    return Err(err);
                };
                let scan = match scope {
                    Some(root) => scan.clone().within(root.clone()),
                    None => scan.clone(),
                };
                match scan.find(self.surface, &self.resolver).await {
                    Some(target) => Ok(target),
                    None => Err(err),
                }
            }
        }
    }

    /// The open modal, when there is one
    pub async fn modal_scope(&self) -> Option<Target> {
        self.resolver
            .try_resolve(self.surface, &catalog::modal(), self.timings.scope)
            .await
    }

    /// Verifies with the suite's default budget.
    pub async fn require(&self, outcome: &Outcome, what: &str) -> Result<String> {
        outcome
            .require(self.surface, &self.resolver, self.timings.verify, what)
            .await
    }

    /// Text of the first visible error-like message, if any
    pub async fn visible_error(&self, candidates: &Candidates) -> Option<String> {
        let target = self
            .resolver
            .try_resolve(self.surface, candidates, Duration::from_secs(2))
            .await?;
        let text = self.surface.text_content(&target).await.ok().flatten();
        Some(text.unwrap_or_default().trim().to_string())
    }

    /// Fails `what` when an error message from `candidates` is showing
    pub async fn reject_error(&self, candidates: &Candidates, what: &str) -> Result<()> {
        match self.visible_error(candidates).await {
            Some(text) => Err(Error::AssertionFailed(format!(
                "{}: error shown: '{}'",
                what, text
            ))),
            None => Ok(()),
        }
    }

    /// A control inside `container` when it has one, else anywhere on the page
    pub async fn find_near(
        &self,
        container: Option<&Target>,
        candidates: &Candidates,
        scan: Option<&KeywordScan>,
    ) -> Result<Target> {
        if let Some(container) = container {
            if let Ok(found) = self.find(Some(container), candidates, NEAR_LOOKUP).await {
                return Ok(found);
            }
        }
        self.find_or_scan(None, candidates, scan).await
    }
}

/// Budget for a control inside a card or row before the page-wide search
const NEAR_LOOKUP: Duration = Duration::from_secs(1);

/// One form field a create flow fills
#[derive(Debug, Clone)]
pub struct FieldFill {
    pub candidates: Candidates,
    pub value: String,
    /// Missing optional fields are skipped
    pub required: bool,
}

impl FieldFill {
    pub fn required(candidates: Candidates, value: impl Into<String>) -> Self {
        Self {
            candidates,
            value: value.into(),
            required: true,
        }
    }

    pub fn optional(candidates: Candidates, value: impl Into<String>) -> Self {
        Self {
            candidates,
            value: value.into(),
            required: false,
        }
    }
}

/// What happens between submitting and verifying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Refresh {
    #[default]
    None,
    Reload,
    /// Navigate back to the flow's route, then reload
    Revisit,
}

/// Open a creation control, fill the form, submit, verify.
///
/// The form is looked up inside the modal when one opened, otherwise on the
/// page.
#[derive(Debug, Clone)]
pub struct CreateAndVerify {
    pub name: String,
    pub route: String,
    /// Control of a blocking dialog to click away before anything else
    pub dismiss: Option<Candidates>,
    pub open: Candidates,
    pub open_scan: Option<KeywordScan>,
    /// Scanned elements are clicked with actionability checks off
    pub force_scanned_click: bool,
    pub fields: Vec<FieldFill>,
    pub submit: Candidates,
    /// Accepted submit labels; a candidate whose label matches none is passed over
    pub submit_keywords: Vec<String>,
    pub refresh: Refresh,
    /// Transient confirmation looked for right after submitting
    pub toast: Option<Outcome>,
    pub verify: Outcome,
    /// Error text that fails the flow even when a success signal was seen
    pub failure_text: Option<Candidates>,
}

impl CreateAndVerify {
    pub fn new(name: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            route: route.into(),
            dismiss: None,
            open: Candidates::new("open control", Vec::<String>::new()),
            open_scan: None,
            force_scanned_click: false,
            fields: Vec::new(),
            submit: Candidates::new("submit control", Vec::<String>::new()),
            submit_keywords: Vec::new(),
            refresh: Refresh::None,
            toast: None,
            verify: Outcome::new(),
            failure_text: None,
        }
    }

    pub fn dismiss_first(mut self, control: Candidates) -> Self {
        self.dismiss = Some(control);
        self
    }

    pub fn open_with(mut self, candidates: Candidates, scan: Option<KeywordScan>) -> Self {
        self.open = candidates;
        self.open_scan = scan;
        self
    }

    pub fn force_scanned_click(mut self) -> Self {
        self.force_scanned_click = true;
        self
    }

    pub fn field(mut self, field: FieldFill) -> Self {
        self.fields.push(field);
        self
    }

    pub fn submit_with(mut self, candidates: Candidates, keywords: &[&str]) -> Self {
        self.submit = candidates;
        self.submit_keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        self
    }

    pub fn reload_before_verify(mut self) -> Self {
        self.refresh = Refresh::Reload;
        self
    }

    pub fn revisit_before_verify(mut self) -> Self {
        self.refresh = Refresh::Revisit;
        self
    }

    /// A toast seen right after submitting passes the flow on its own
    pub fn accept_toast(mut self, outcome: Outcome) -> Self {
        self.toast = Some(outcome);
        self
    }

    pub fn verify_with(mut self, outcome: Outcome) -> Self {
        self.verify = outcome;
        self
    }

    pub fn fail_on(mut self, candidates: Candidates) -> Self {
        self.failure_text = Some(candidates);
        self
    }

    pub async fn run(&self, ctx: &FlowContext<'_>) -> Result<FlowReport> {
        tracing::info!("{}: opening {}", self.name, self.route);
        ctx.open(&self.route).await?;
        if let Some(dismiss) = &self.dismiss {
            ctx.dismiss(dismiss).await?;
        }

        self.click_open_control(ctx).await?;
        ctx.pause(ctx.timings.after_action).await;

        let scope = ctx.modal_scope().await;
        if scope.is_some() {
            tracing::debug!("{}: form is in a modal", self.name);
        }

        for field in &self.fields {
            match ctx
                .find(scope.as_ref(), &field.candidates, ctx.timings.control)
                .await
            {
                Ok(target) => {
                    ctx.surface.fill(&target, &field.value).await?;
                    tracing::debug!("{}: filled {}", self.name, field.candidates.intent());
                }
                Err(e) if field.required => {
                    return Err(e.context(format!("{}: form not found", self.name)));
                }
                Err(_) => {
                    tracing::debug!("{}: no {}", self.name, field.candidates.intent());
                }
            }
        }

        let submit = self.submit_control(ctx, scope.as_ref()).await?;
        ctx.surface.click(&submit, false).await?;
        tracing::info!("{}: submitted", self.name);
        ctx.pause(ctx.timings.after_action).await;

        if let Some(modal) = &scope {
            let gone = Candidates::new("open modal", [modal.selector.clone()]);
            if !wait_until_gone(ctx.surface, &ctx.resolver, &gone, Duration::from_secs(5)).await {
                tracing::debug!("{}: modal still open after submit", self.name);
            }
        }

        let toast = match &self.toast {
            Some(outcome) => {
                outcome
                    .any(ctx.surface, &ctx.resolver, Duration::from_secs(5))
                    .await
            }
            None => None,
        };

        match self.refresh {
            Refresh::None => {}
            Refresh::Reload => ctx.reload().await?,
            Refresh::Revisit => {
                ctx.open(&self.route).await?;
                ctx.reload().await?;
            }
        }

        let signal = match toast {
            Some(signal) => signal,
            None => ctx.require(&self.verify, &self.name).await?,
        };

        if let Some(failure) = &self.failure_text {
            if let Some(text) = ctx.visible_error(failure).await {
                return Err(Error::AssertionFailed(format!(
                    "{}: error shown after submit: '{}'",
                    self.name, text
                )));
            }
        }

        Ok(FlowReport::passed(self.name.clone(), signal))
    }

    async fn click_open_control(&self, ctx: &FlowContext<'_>) -> Result<()> {
        match ctx.find(None, &self.open, ctx.timings.control).await {
            Ok(target) => ctx.surface.click(&target, false).await,
            Err(err) => {
                let scanned = match &self.open_scan {
                    Some(scan) => scan.find(ctx.surface, &ctx.resolver).await,
                    None => None,
                };
                match scanned {
                    Some(target) => {
                        tracing::debug!("{}: opening via scanned {}", self.name, target);
                        ctx.surface.click(&target, self.force_scanned_click).await
                    }
                    None => Err(err.context(format!("{}: nothing opens the form", self.name))),
                }
            }
        }
    }

    async fn submit_control(&self, ctx: &FlowContext<'_>, scope: Option<&Target>) -> Result<Target> {
        let rules: Vec<KeywordRule> = self
            .submit_keywords
            .iter()
            .map(|k| KeywordRule::Contains(k.clone()))
            .collect();

        if let Ok(target) = ctx.find(scope, &self.submit, ctx.timings.control).await {
            if rules.is_empty() || self.label_accepted(ctx, &target, &rules).await {
                return Ok(target);
            }
        }

        let mut scan = KeywordScan::new(["button", "[role=\"button\"]"]);
        for rule in rules {
            scan = scan.rule(rule);
        }
        if let Some(root) = scope {
            scan = scan.within(root.clone());
        }
        scan.find(ctx.surface, &ctx.resolver)
            .await
            .ok_or_else(|| Error::NotFound {
                intent: format!("{} submit button", self.name),
                tried: self.submit.selectors().to_vec(),
                url: ctx.surface.url(),
                last_error: "no visible control with an accepted label".to_string(),
            })
    }

    async fn label_accepted(
        &self,
        ctx: &FlowContext<'_>,
        target: &Target,
        rules: &[KeywordRule],
    ) -> bool {
        let text = ctx
            .surface
            .text_content(target)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let label = crate::locator::scan::ElementLabel {
            text,
            ..Default::default()
        };
        crate::locator::scan::label_matches(&label, rules)
    }
}

/// Candidates matching elements whose text matches `pattern`
pub(crate) fn success_text(pattern: &str) -> String {
    catalog::text_matching(pattern)
}

/// The usual "it worked" text and toasts
pub(crate) fn success_signals() -> Vec<String> {
    vec![
        "[role=\"alert\"]:has-text(\"success\")".to_string(),
        "[class*=\"toast\"]:has-text(\"success\")".to_string(),
        success_text("created|success|saved"),
    ]
}

/// Text that marks a failed action
pub(crate) fn error_text() -> Candidates {
    Candidates::new("error message", [catalog::text_matching("error|failed")])
}

/// Unique suffix for names created by a run
pub fn unique_suffix() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    millis.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_report_constructors() {
        let ok = FlowReport::passed("upload", "visible [data-testid=\"doc-card\"]");
        assert!(!ok.is_skipped());
        assert_eq!(ok.signal.as_deref(), Some("visible [data-testid=\"doc-card\"]"));

        let skip = FlowReport::skipped("logout", "no logout control");
        assert!(skip.is_skipped());
        assert_eq!(skip.signal, None);
    }

    #[test]
    fn test_create_and_verify_builder() {
        let flow = CreateAndVerify::new("create workspace", "/workspaces")
            .submit_with(Candidates::new("save", ["button[type=\"submit\"]"]), &["Create", "Save"])
            .field(FieldFill::optional(
                Candidates::new("description", ["textarea"]),
                "desc",
            ))
            .revisit_before_verify();
        assert_eq!(flow.submit_keywords, vec!["create", "save"]);
        assert_eq!(flow.fields.len(), 1);
        assert!(!flow.fields[0].required);
        assert_eq!(flow.refresh, Refresh::Revisit);
        assert!(flow.toast.is_none());
    }

    #[test]
    fn test_unique_suffix_is_numeric() {
        assert!(unique_suffix().chars().all(|c| c.is_ascii_digit()));
    }
}
