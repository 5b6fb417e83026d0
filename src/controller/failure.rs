use serde::Serialize;
use thiserror::Error;

use crate::controller::transport::TransportError;
use crate::feedback::markup::push_escaped;

pub const EMPTY_ESSAY: &str = "EMPTY_ESSAY";
pub const MAX_ATTEMPTS_REACHED: &str = "MAX_ATTEMPTS_REACHED";
pub const BACKEND_TIMEOUT: &str = "BACKEND_TIMEOUT";

pub(crate) const EMPTY_ESSAY_MESSAGE: &str = "Please type your essay before submitting.";
pub(crate) const MAX_ATTEMPTS_MESSAGE: &str =
    "You have already used all available attempts for this question.";
pub(crate) const TIMEOUT_MESSAGE: &str =
    "The scoring service took too long to respond. Please wait a moment and try again.";
pub(crate) const IN_FLIGHT_MESSAGE: &str = "Your essay is already being submitted.";
pub(crate) const GENERIC_MESSAGE: &str =
    "Something went wrong while scoring your essay. Please try again later.";

/// Why a submit did not produce feedback.
#[derive(Debug, Error)]
pub enum SubmissionFailure {
    #[error("essay text is empty")]
    EmptyEssay,
    #[error("all {max_attempts} attempts have been used ({attempts_used} used)")]
    AttemptsExhausted { attempts_used: u32, max_attempts: u32 },
    #[error("scoring backend rejected the submission with {code}")]
    Backend { code: String, message: Option<String> },
    #[error("scoring endpoint answered with an unrecognized body")]
    UnexpectedResponse,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("a submission is already in flight")]
    InFlight,
}

impl SubmissionFailure {
    pub fn code(&self) -> Option<&str> {
        match self {
            SubmissionFailure::EmptyEssay => Some(EMPTY_ESSAY),
            SubmissionFailure::AttemptsExhausted { .. } => Some(MAX_ATTEMPTS_REACHED),
            SubmissionFailure::Backend { code, .. } => Some(code.as_str()),
            SubmissionFailure::UnexpectedResponse
            | SubmissionFailure::Transport(_)
            | SubmissionFailure::InFlight => None,
        }
    }

    /// Whether this failure ends submissions for the rest of the session.
    pub fn locks_submission(&self) -> bool {
        self.code() == Some(MAX_ATTEMPTS_REACHED)
    }
}

/// The single user-facing presentation of every failure kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub code: Option<String>,
    pub message: String,
    /// Request context for transport failures, e.g. `POST <url> returned HTTP 502`.
    pub context: Option<String>,
    pub disable_submit: bool,
}

impl ErrorView {
    pub fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"essay-error\" role=\"alert\"><p>");
        push_escaped(&mut out, &self.message);
        out.push_str("</p>");
        if let Some(context) = &self.context {
            out.push_str("<p class=\"essay-error-context\">");
            push_escaped(&mut out, context);
            out.push_str("</p>");
        }
        out.push_str("</div>");
        out
    }
}

impl From<&SubmissionFailure> for ErrorView {
    fn from(failure: &SubmissionFailure) -> Self {
        let backend_message = match failure {
            SubmissionFailure::Backend { message, .. } => {
                message.as_deref().map(str::trim).filter(|message| !message.is_empty())
            }
            _ => None,
        };

        let message = match backend_message {
            Some(message) => message.to_string(),
            None => fallback_message(failure).to_string(),
        };

        let context = match failure {
            SubmissionFailure::Transport(err) => Some(err.to_string()),
            _ => None,
        };

        Self {
            code: failure.code().map(str::to_string),
            message,
            context,
            disable_submit: failure.locks_submission(),
        }
    }
}

fn fallback_message(failure: &SubmissionFailure) -> &'static str {
    match failure {
        SubmissionFailure::EmptyEssay => EMPTY_ESSAY_MESSAGE,
        SubmissionFailure::AttemptsExhausted { .. } => MAX_ATTEMPTS_MESSAGE,
        SubmissionFailure::InFlight => IN_FLIGHT_MESSAGE,
        SubmissionFailure::Backend { code, .. } => match code.as_str() {
            MAX_ATTEMPTS_REACHED => MAX_ATTEMPTS_MESSAGE,
            BACKEND_TIMEOUT => TIMEOUT_MESSAGE,
            EMPTY_ESSAY => EMPTY_ESSAY_MESSAGE,
            _ => GENERIC_MESSAGE,
        },
        SubmissionFailure::UnexpectedResponse | SubmissionFailure::Transport(_) => GENERIC_MESSAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(code: &str, message: Option<&str>) -> SubmissionFailure {
        SubmissionFailure::Backend { code: code.to_string(), message: message.map(str::to_string) }
    }

    #[test]
    fn backend_message_takes_precedence() {
        let view = ErrorView::from(&backend("BACKEND_TIMEOUT", Some("Grader is busy")));
        assert_eq!(view.message, "Grader is busy");
        assert_eq!(view.code.as_deref(), Some("BACKEND_TIMEOUT"));
        assert!(!view.disable_submit);
    }

    #[test]
    fn recognized_codes_get_specific_fallbacks() {
        assert_eq!(ErrorView::from(&backend("BACKEND_TIMEOUT", None)).message, TIMEOUT_MESSAGE);
        assert_eq!(ErrorView::from(&backend("WHATEVER", Some("  "))).message, GENERIC_MESSAGE);
    }

    #[test]
    fn only_attempt_exhaustion_disables_submission() {
        let local = SubmissionFailure::AttemptsExhausted { attempts_used: 3, max_attempts: 3 };
        assert!(ErrorView::from(&local).disable_submit);
        assert_eq!(ErrorView::from(&local).message, MAX_ATTEMPTS_MESSAGE);
        assert!(ErrorView::from(&backend(MAX_ATTEMPTS_REACHED, None)).disable_submit);

        assert!(!ErrorView::from(&SubmissionFailure::EmptyEssay).disable_submit);
        assert!(!ErrorView::from(&SubmissionFailure::UnexpectedResponse).disable_submit);
    }

    #[test]
    fn transport_failure_keeps_request_context_apart_from_message() {
        let failure = SubmissionFailure::Transport(TransportError::Status {
            method: "POST",
            url: "http://host/submit".to_string(),
            status: 502,
        });
        let view = ErrorView::from(&failure);

        assert_eq!(view.code, None);
        assert_eq!(view.message, GENERIC_MESSAGE);
        assert_eq!(view.context.as_deref(), Some("POST http://host/submit returned HTTP 502"));
        assert!(view.to_html().contains("essay-error-context"));
    }

    #[test]
    fn error_html_is_escaped() {
        let view = ErrorView::from(&backend("X", Some("<b>bad</b>")));
        assert_eq!(
            view.to_html(),
            "<div class=\"essay-error\" role=\"alert\"><p>&lt;b&gt;bad&lt;/b&gt;</p></div>"
        );
    }
}
