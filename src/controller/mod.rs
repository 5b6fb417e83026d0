//! Submission state machine for one essay widget session.
//!
//! The controller owns the attempt counters and the submit control. It runs the local
//! guards, hands the essay to an injected [`SubmissionTransport`], and routes the answer to
//! the [`FeedbackPresenter`] or to an [`ErrorView`].

pub mod clipboard;
pub mod counters;
pub mod failure;
pub mod transport;

use serde::Serialize;
use serde_json::Value;
use validator::{Validate, ValidationErrors};

pub use counters::{Advisory, TextLimits, TextStats};
pub use failure::{ErrorView, SubmissionFailure};
pub use transport::{HttpTransport, SubmissionTransport, TransportError};

use crate::feedback::presenter::{FeedbackPresenter, FeedbackView, Region};
use crate::schemas::essay::{ingest, EssayPayload, SubmissionResponse, WidgetConfig};

pub(crate) const SUBMIT_LABEL: &str = "Submit essay";
pub(crate) const SUBMITTING_LABEL: &str = "Submitting...";

/// Host capability that scrolls a freshly rendered region into view.
pub trait ViewportNotifier: Send + Sync {
    fn notify_visible(&self, region: Region);
}

impl<F> ViewportNotifier for F
where
    F: Fn(Region) + Send + Sync,
{
    fn notify_visible(&self, region: Region) {
        self(region)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptState {
    pub attempts_used: u32,
    pub max_attempts: u32,
}

impl AttemptState {
    pub fn exhausted(&self) -> bool {
        self.attempts_used >= self.max_attempts
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts_used)
    }

    /// Take a server-reported count; the counter never moves backwards.
    fn observe(&mut self, reported: Option<u32>) {
        if let Some(reported) = reported {
            self.attempts_used = self.attempts_used.max(reported);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitControl {
    pub enabled: bool,
    pub label: &'static str,
    /// Set once attempts are exhausted; a locked control stays disabled.
    pub locked: bool,
}

impl SubmitControl {
    fn ready() -> Self {
        Self { enabled: true, label: SUBMIT_LABEL, locked: false }
    }

    fn engage(&mut self) {
        self.enabled = false;
        self.label = SUBMITTING_LABEL;
    }

    fn release(&mut self) {
        self.enabled = !self.locked;
        self.label = SUBMIT_LABEL;
    }

    fn lock(&mut self) {
        self.locked = true;
        self.enabled = false;
        self.label = SUBMIT_LABEL;
    }
}

/// What a successful submit produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReport {
    pub view: FeedbackView,
    pub advisories: Vec<Advisory>,
    pub attempts: AttemptState,
}

/// Holds the control disabled and the state at `Submitting` while a request is out.
/// Dropping it re-enables the control on every path, including a dropped future.
struct InFlight<'a> {
    state: &'a mut SubmissionState,
    control: &'a mut SubmitControl,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a mut SubmissionState, control: &'a mut SubmitControl) -> Self {
        *state = SubmissionState::Submitting;
        control.engage();
        Self { state, control }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.control.release();
        if *self.state == SubmissionState::Submitting {
            *self.state = SubmissionState::Idle;
        }
    }
}

pub struct SubmissionController<T, N> {
    config: WidgetConfig,
    attempts: AttemptState,
    state: SubmissionState,
    control: SubmitControl,
    presenter: FeedbackPresenter,
    transport: T,
    notifier: N,
    last_view: Option<FeedbackView>,
    last_error: Option<ErrorView>,
}

impl<T, N> SubmissionController<T, N>
where
    T: SubmissionTransport,
    N: ViewportNotifier,
{
    pub fn new(config: WidgetConfig, transport: T, notifier: N) -> Result<Self, ValidationErrors> {
        config.validate()?;

        let attempts =
            AttemptState { attempts_used: config.attempts_used, max_attempts: config.max_attempts };
        let presenter = FeedbackPresenter::new(config.mode);

        Ok(Self {
            config,
            attempts,
            state: SubmissionState::Idle,
            control: SubmitControl::ready(),
            presenter,
            transport,
            notifier,
            last_view: None,
            last_error: None,
        })
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn attempts(&self) -> AttemptState {
        self.attempts
    }

    pub fn control(&self) -> SubmitControl {
        self.control
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn last_view(&self) -> Option<&FeedbackView> {
        self.last_view.as_ref()
    }

    pub fn last_error(&self) -> Option<&ErrorView> {
        self.last_error.as_ref()
    }

    /// Live counters for the editor; recomputed on every change.
    pub fn on_text_changed(&self, text: &str) -> TextStats {
        counters::measure(text, TextLimits::from(&self.config))
    }

    /// Render a result stored from an earlier session without touching the state machine.
    pub fn restore(&mut self, previous: Value, essay_text: &str) -> Option<&FeedbackView> {
        let SubmissionResponse::Success(result) = ingest(previous) else {
            tracing::debug!("Stored result is not a successful submission; skipping restore");
            return None;
        };

        self.attempts.observe(result.attempts_used);
        let view = self.presenter.present(&result, essay_text, self.config.show_score_in_exam);
        self.last_view = Some(view);
        self.last_view.as_ref()
    }

    pub async fn submit(&mut self, text: &str) -> Result<SubmitReport, SubmissionFailure> {
        if self.state == SubmissionState::Submitting {
            tracing::warn!("Submit ignored: a submission is already in flight");
            return Err(SubmissionFailure::InFlight);
        }
        self.state = SubmissionState::Idle;

        let limits = TextLimits::from(&self.config);
        let stats = counters::measure(text, limits);

        if stats.words == 0 {
            return Err(self.fail(SubmissionFailure::EmptyEssay));
        }

        if self.control.locked || self.attempts.exhausted() {
            return Err(self.fail(SubmissionFailure::AttemptsExhausted {
                attempts_used: self.attempts.attempts_used,
                max_attempts: self.attempts.max_attempts,
            }));
        }

        let advisories = stats.advisories(limits);
        for advisory in &advisories {
            tracing::info!(%advisory, "Submitting with advisory");
        }

        let payload = EssayPayload::new(text);
        let outcome = {
            let _flight = InFlight::begin(&mut self.state, &mut self.control);
            self.transport.submit(&payload).await
        };

        let body = match outcome {
            Ok(body) => body,
            Err(err) if err.is_timeout() => {
                return Err(self.fail(SubmissionFailure::Backend {
                    code: failure::BACKEND_TIMEOUT.to_string(),
                    message: None,
                }));
            }
            Err(err) => return Err(self.fail(SubmissionFailure::Transport(err))),
        };

        match ingest(body) {
            SubmissionResponse::Success(result) => {
                self.attempts.observe(result.attempts_used);
                let view = self.presenter.present(&result, text, self.config.show_score_in_exam);

                self.state = SubmissionState::Succeeded;
                self.last_error = None;
                self.last_view = Some(view.clone());
                self.notifier.notify_visible(Region::Feedback);

                tracing::info!(
                    attempts_used = self.attempts.attempts_used,
                    max_attempts = self.attempts.max_attempts,
                    mode = view.mode.as_str(),
                    "Essay scored"
                );

                Ok(SubmitReport { view, advisories, attempts: self.attempts })
            }
            SubmissionResponse::Failure(error) => {
                self.attempts.observe(error.attempts_used);
                Err(self.fail(SubmissionFailure::Backend {
                    code: error.error.code().to_string(),
                    message: error.error.message,
                }))
            }
            SubmissionResponse::Malformed => Err(self.fail(SubmissionFailure::UnexpectedResponse)),
        }
    }

    fn fail(&mut self, failure: SubmissionFailure) -> SubmissionFailure {
        let view = ErrorView::from(&failure);
        if view.disable_submit {
            self.control.lock();
        }

        tracing::warn!(
            error = %failure,
            code = failure.code().unwrap_or("-"),
            attempts_used = self.attempts.attempts_used,
            "Essay submission failed"
        );

        self.state = SubmissionState::Failed;
        self.last_error = Some(view);
        failure
    }
}
