use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::behavior::BehaviorSimulator;
use crate::config::{EngineConfig, SubmitMode};
use crate::error::Error;
use crate::fill::FieldFiller;
use crate::locator;
use crate::model::{
    AnswerMap, AttemptOutput, AuditArtifacts, FieldDescriptor, FillReport, FillResult,
    SubmissionOutcome, SubmissionStatus,
};
use crate::page::Page;

/// Progress of one attempt. Ordered: a later phase implies every earlier one
/// was passed, which is what makes "no Submitted without FieldsFilled"
/// structural rather than aspirational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    Navigated,
    FormRevealed,
    FieldsFilled,
    PreSubmitCaptured,
    ManualReview,
    AutoSubmitAttempted,
}

/// Hand the operator side of an attempt: acknowledging a captcha pause or
/// confirming a manual submission.
#[derive(Clone)]
pub struct OperatorHandle {
    tx: mpsc::Sender<()>,
}

impl OperatorHandle {
    /// Signal that the pending human step (captcha solved, manual submit
    /// clicked) is done.
    pub async fn acknowledge(&self) {
        let _ = self.tx.send(()).await;
    }
}

pub struct OperatorFeed {
    rx: mpsc::Receiver<()>,
}

/// Channel pair connecting a human operator to a running attempt.
pub fn operator_channel() -> (OperatorHandle, OperatorFeed) {
    let (tx, rx) = mpsc::channel(4);
    (OperatorHandle { tx }, OperatorFeed { rx })
}

/// Top-level state machine for one application attempt: navigate, reveal the
/// form, drive the fill loop, capture audit snapshots, submit, classify.
/// Terminal outcomes are never retried internally; callers re-invoke the
/// whole workflow if they want another go.
pub struct SubmissionController<'a> {
    page: &'a Page,
    config: &'a EngineConfig,
    behavior: BehaviorSimulator,
    resume_path: Option<PathBuf>,
    phase: Phase,
    trail: Vec<Phase>,
}

impl<'a> SubmissionController<'a> {
    pub fn new(page: &'a Page, config: &'a EngineConfig, resume_path: Option<PathBuf>) -> Self {
        Self {
            page,
            config,
            behavior: BehaviorSimulator::new(config.behavior.clone()),
            resume_path,
            phase: Phase::Init,
            trail: vec![Phase::Init],
        }
    }

    /// Phases passed so far, in order.
    pub fn trail(&self) -> &[Phase] {
        &self.trail
    }

    fn advance(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
        self.trail.push(next);
    }

    /// Drive one attempt end to end. Never returns a raw error: every exit
    /// path, including cancellation, folds into a terminal
    /// [`SubmissionOutcome`] with a human-readable message.
    pub async fn run(
        &mut self,
        job_url: &str,
        fields: &[FieldDescriptor],
        answers: &AnswerMap,
        operator: &mut OperatorFeed,
        cancel: &CancellationToken,
    ) -> AttemptOutput {
        let mut report = FillReport::new();
        let mut artifacts = AuditArtifacts::default();

        if let Err(e) = self.navigate(job_url, cancel).await {
            return AttemptOutput {
                report,
                outcome: SubmissionOutcome::failed(e.to_string()),
                artifacts,
            };
        }
        self.advance(Phase::Navigated);

        self.reveal_form(&mut artifacts).await;
        self.advance(Phase::FormRevealed);

        if let Err(e) = self
            .fill_fields(fields, answers, &mut report, cancel)
            .await
        {
            return AttemptOutput {
                report,
                outcome: SubmissionOutcome::failed(e.to_string()),
                artifacts,
            };
        }
        self.advance(Phase::FieldsFilled);
        info!(
            filled = report.filled(),
            skipped = report.skipped(),
            errors = report.errors(),
            "fill loop done"
        );

        artifacts.pre_submit_png = self.page.screenshot_full_page().await.ok();
        self.advance(Phase::PreSubmitCaptured);

        let outcome = match self.config.submit_mode {
            SubmitMode::Manual => self.manual_review(operator, cancel).await,
            SubmitMode::Auto => self.auto_submit(&mut artifacts, operator, cancel).await,
        };

        if self.config.hold_for_inspection && !cancel.is_cancelled() {
            info!("holding page open for inspection until cancelled");
            cancel.cancelled().await;
        }

        AttemptOutput {
            report,
            outcome,
            artifacts,
        }
    }

    // ── Init → Navigated ────────────────────────────────────────────

    async fn navigate(&mut self, url: &str, cancel: &CancellationToken) -> crate::error::Result<()> {
        let retries = self.config.navigation_retries.max(1);
        for attempt in 1..=retries {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            info!(url, attempt, "navigating");
            match tokio::time::timeout(self.config.navigation_timeout, self.page.goto(url)).await {
                Ok(Ok(())) => {
                    self.page.wait_for_settle(self.config.settle_timeout).await?;
                    return Ok(());
                }
                Ok(Err(e)) => warn!(attempt, error = %e, "navigation failed"),
                Err(_) => warn!(attempt, "navigation timed out"),
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Err(Error::NavigationTimeout {
            url: url.to_string(),
            attempts: retries,
        })
    }

    // ── Navigated → FormRevealed ────────────────────────────────────

    /// Click an "Apply"-style affordance if one exists; if no interactive
    /// fields show up, retry the affordance once, then proceed best-effort.
    async fn reveal_form(&mut self, artifacts: &mut AuditArtifacts) {
        for round in 0..2 {
            match locator::first_match(self.page, locator::APPLY_CASCADE).await {
                Ok(Some(button)) => {
                    debug!(round, "clicking apply affordance");
                    if button.click().await.is_ok() {
                        let _ = self.page.wait_for_settle(self.config.settle_timeout).await;
                    }
                }
                Ok(None) => debug!(round, "no apply affordance, form may already be visible"),
                Err(e) => warn!(round, error = %e, "apply cascade failed"),
            }
            if self
                .page
                .wait_for_selector("input, textarea, select")
                .await
                .is_ok()
            {
                break;
            }
            warn!(round, "no interactive fields detected after apply click");
        }

        artifacts.form_debug_png = self.page.screenshot_full_page().await.ok();
    }

    // ── FormRevealed → FieldsFilled ─────────────────────────────────

    async fn fill_fields(
        &mut self,
        fields: &[FieldDescriptor],
        answers: &AnswerMap,
        report: &mut FillReport,
        cancel: &CancellationToken,
    ) -> crate::error::Result<()> {
        let mut filler = FieldFiller::new(self.page, self.resume_path.clone());
        let mut queue = self.behavior.plan(fields.len());
        let mut filled = 0usize;

        while let Some(index) = queue.next() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let field = &fields[index];

            let Some(answer) = answers.get(&field.path) else {
                debug!(path = %field.path, "no answer value, skipping");
                report.record(FillResult::skipped(&field.path, "no answer value"));
                continue;
            };

            let located = match locator::locate(self.page, field).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(path = %field.path, error = %e, "locator error");
                    None
                }
            };
            let Some(element) = located else {
                report.record(FillResult::skipped(&field.path, "element not found"));
                continue;
            };

            if let Err(e) = self.behavior.wander(self.page).await {
                debug!(error = %e, "pointer wander failed, continuing");
            }

            // Human skip-and-return: put the field off once, re-enqueued at
            // the back of the work queue.
            if !queue.was_deferred(index) && self.behavior.should_defer() && queue.defer(index) {
                debug!(path = %field.path, "deferring field to end of queue");
                continue;
            }

            let value_text = answer.as_text().unwrap_or_default().to_string();
            let result = filler.fill(&mut self.behavior, field, &element, answer).await;
            report.record(result);
            filled += 1;

            self.behavior.settle_after(field, &value_text).await;
            if let Err(e) = self.behavior.maybe_reread(self.page, filled).await {
                debug!(error = %e, "reread scroll failed, continuing");
            }
        }
        Ok(())
    }

    // ── PreSubmitCaptured → ManualSubmit ────────────────────────────

    async fn manual_review(
        &mut self,
        operator: &mut OperatorFeed,
        cancel: &CancellationToken,
    ) -> SubmissionOutcome {
        self.advance(Phase::ManualReview);
        info!("form filled; waiting for operator to submit manually");
        tokio::select! {
            _ = cancel.cancelled() => {
                SubmissionOutcome::failed("attempt cancelled during manual review")
            }
            ack = operator.rx.recv() => match ack {
                Some(()) => SubmissionOutcome::new(
                    SubmissionStatus::ManualSubmit,
                    "Form filled, operator submitted manually",
                ),
                None => SubmissionOutcome::failed("operator channel closed during manual review"),
            },
        }
    }

    // ── PreSubmitCaptured → terminal via AutoSubmitAttempted ────────

    async fn auto_submit(
        &mut self,
        artifacts: &mut AuditArtifacts,
        operator: &mut OperatorFeed,
        cancel: &CancellationToken,
    ) -> SubmissionOutcome {
        self.advance(Phase::AutoSubmitAttempted);

        let button = match locator::first_match(self.page, locator::SUBMIT_CASCADE).await {
            Ok(Some(button)) => button,
            Ok(None) => {
                warn!("{}", Error::SubmitAffordanceNotFound);
                return SubmissionOutcome::failed("Submit button not found");
            }
            Err(e) => return SubmissionOutcome::failed(format!("submit cascade failed: {e}")),
        };

        if let Err(e) = self.behavior.wander(self.page).await {
            debug!(error = %e, "pointer wander failed, continuing");
        }
        if self.captcha_present().await {
            if let Err(e) = self.pause_for_captcha(operator, cancel).await {
                return SubmissionOutcome::failed(e.to_string());
            }
        }

        let _ = button.scroll_into_view().await;
        if let Err(e) = button.click().await {
            return SubmissionOutcome::failed(format!("submit click failed: {e}"));
        }
        let _ = self.page.wait_for_settle(self.config.settle_timeout).await;

        if self.captcha_present().await {
            if let Err(e) = self.pause_for_captcha(operator, cancel).await {
                return SubmissionOutcome::failed(e.to_string());
            }
            let _ = self.page.wait_for_settle(self.config.settle_timeout).await;
        }

        artifacts.post_submit_png = self.page.screenshot_full_page().await.ok();
        artifacts.page_html = self.page.html().await.ok();

        let text = self.page.body_text().await.unwrap_or_default();
        debug_assert!(self.phase >= Phase::FieldsFilled);
        classify_page_text(&text)
    }

    /// Captcha heuristics: challenge iframes, captcha-ish class/id, visible
    /// text. Best effort; a probe failure counts as no captcha.
    async fn captcha_present(&self) -> bool {
        const PROBE: &str = r#"(() => {
            if (document.querySelector('iframe[title*="recaptcha" i], iframe[src*="captcha" i]')) return true;
            if (document.querySelector('[class*="captcha" i], [id*="captcha" i]')) return true;
            const text = document.body ? document.body.innerText.toLowerCase() : '';
            return text.includes('captcha');
        })()"#;
        self.page.evaluate_bool(PROBE).await.unwrap_or(false)
    }

    /// A captcha is not fatal: block until a human reports it solved, or the
    /// attempt is cancelled.
    async fn pause_for_captcha(
        &self,
        operator: &mut OperatorFeed,
        cancel: &CancellationToken,
    ) -> crate::error::Result<()> {
        warn!("captcha detected; waiting for operator resolution");
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            ack = operator.rx.recv() => match ack {
                Some(()) => {
                    info!("operator reports captcha resolved");
                    Ok(())
                }
                None => Err(Error::Cancelled),
            },
        }
    }
}

/// Keyword scan over rendered page text. Acknowledged brittle placeholder:
/// replace with a site-specific DOM marker when one is available, and do not
/// read stronger guarantees into it than the keywords give.
fn classify_page_text(text: &str) -> SubmissionOutcome {
    let lower = text.to_lowercase();
    if lower.contains("spam") || lower.contains("flagged") {
        SubmissionOutcome::new(SubmissionStatus::Flagged, "Application flagged as spam")
    } else if ["thank you", "submitted", "received"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        SubmissionOutcome::new(
            SubmissionStatus::Submitted,
            "Application submitted successfully",
        )
    } else {
        SubmissionOutcome::new(
            SubmissionStatus::Uncertain,
            "Submitted but confirmation unclear",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Init < Phase::Navigated);
        assert!(Phase::FieldsFilled < Phase::PreSubmitCaptured);
        assert!(Phase::PreSubmitCaptured < Phase::AutoSubmitAttempted);
    }

    #[test]
    fn classification_prefers_flag_keywords() {
        let out = classify_page_text("Thank you! Unfortunately this was flagged as spam.");
        assert_eq!(out.status, SubmissionStatus::Flagged);
    }

    #[test]
    fn classification_detects_confirmation() {
        for text in [
            "Thank you for applying!",
            "Your application has been submitted.",
            "We have received your application.",
        ] {
            assert_eq!(classify_page_text(text).status, SubmissionStatus::Submitted);
        }
    }

    #[test]
    fn classification_defaults_to_uncertain() {
        let out = classify_page_text("Welcome to our careers page.");
        assert_eq!(out.status, SubmissionStatus::Uncertain);
    }

    #[tokio::test]
    async fn operator_handle_feeds_the_controller_side() {
        let (handle, mut feed) = operator_channel();
        handle.acknowledge().await;
        assert_eq!(feed.rx.recv().await, Some(()));
    }
}
