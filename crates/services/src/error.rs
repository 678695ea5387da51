//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use quiz_core::model::{QuestionError, QuestionId, SessionStatus, SubmissionError};
use quiz_core::progress::ProgressError;
use storage::repository::StorageError;

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Show a dismissible notification; the user may retry explicitly.
    Recoverable,
    /// The credential is unusable; send the user back to login.
    Fatal,
    /// The server refused the request as stated; resending it cannot succeed.
    /// The attempt has to be abandoned or restarted.
    Rejected,
    /// Wiring bug. Log it and fall back to the last good screen.
    Contract,
}

/// Errors emitted by the remote quiz API client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("invalid answer: {0}")]
    Validation(String),
    #[error("not authenticated")]
    Authentication,
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {detail}")]
    Server { status: u16, detail: String },
    #[error("session is {status}, expected in_progress")]
    InvalidState { status: SessionStatus },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ApiError::Server { status, .. } if is_rejection(*status) => ErrorSeverity::Rejected,
            ApiError::Validation(_) | ApiError::Network(_) | ApiError::Server { .. } => {
                ErrorSeverity::Recoverable
            }
            ApiError::Authentication => ErrorSeverity::Fatal,
            ApiError::InvalidState { .. } | ApiError::Decode(_) | ApiError::Config(_) => {
                ErrorSeverity::Contract
            }
        }
    }
}

/// 4xx other than request timeout (408) and rate limiting (429).
fn is_rejection(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network(format!("request timed out: {err}"))
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::Config(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<QuestionError> for ApiError {
    fn from(err: QuestionError) -> Self {
        ApiError::Decode(format!("invalid question: {err}"))
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        ApiError::Decode(format!("invalid verdict: {err}"))
    }
}

/// Lifecycle actions, used to report illegal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Submit,
    Advance,
    Retake,
    Abandon,
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionAction::Start => "start",
            SessionAction::Submit => "submit",
            SessionAction::Advance => "advance",
            SessionAction::Retake => "retake",
            SessionAction::Abandon => "abandon",
        };
        f.write_str(name)
    }
}

/// Errors emitted by the session state machine, sequencer and pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    EmptyQuestionSet,
    #[error("question index {index} is out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("cannot {action} while session is {from}")]
    IllegalTransition {
        from: SessionStatus,
        action: SessionAction,
    },
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("verdict arrived for a session that has since been reset")]
    StaleSubmission,
    #[error("verdict for question {actual} does not match current question {expected}")]
    QuestionMismatch {
        expected: QuestionId,
        actual: QuestionId,
    },
    #[error("invalid answer: {0}")]
    Validation(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SessionError::Validation(_) | SessionError::SubmissionInFlight => {
                ErrorSeverity::Recoverable
            }
            SessionError::Api(err) => err.severity(),
            SessionError::EmptyQuestionSet
            | SessionError::OutOfRange { .. }
            | SessionError::IllegalTransition { .. }
            | SessionError::StaleSubmission
            | SessionError::QuestionMismatch { .. } => ErrorSeverity::Contract,
        }
    }
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_follow_taxonomy() {
        assert_eq!(
            SessionError::Validation("empty".into()).severity(),
            ErrorSeverity::Recoverable
        );
        assert_eq!(
            SessionError::Api(ApiError::Authentication).severity(),
            ErrorSeverity::Fatal
        );
        assert_eq!(
            SessionError::Api(ApiError::Server {
                status: 500,
                detail: "boom".into()
            })
            .severity(),
            ErrorSeverity::Recoverable
        );
        assert_eq!(
            SessionError::IllegalTransition {
                from: SessionStatus::Completed,
                action: SessionAction::Submit,
            }
            .severity(),
            ErrorSeverity::Contract
        );
    }

    #[test]
    fn client_errors_are_rejections_but_throttling_is_not() {
        let server = |status| ApiError::Server {
            status,
            detail: String::new(),
        };
        assert_eq!(server(400).severity(), ErrorSeverity::Rejected);
        assert_eq!(server(422).severity(), ErrorSeverity::Rejected);
        assert_eq!(server(408).severity(), ErrorSeverity::Recoverable);
        assert_eq!(server(429).severity(), ErrorSeverity::Recoverable);
        assert_eq!(server(503).severity(), ErrorSeverity::Recoverable);
        assert_eq!(
            SessionError::Api(server(400)).severity(),
            ErrorSeverity::Rejected
        );
    }

    #[test]
    fn illegal_transition_message_names_state_and_action() {
        let err = SessionError::IllegalTransition {
            from: SessionStatus::NotStarted,
            action: SessionAction::Advance,
        };
        assert_eq!(err.to_string(), "cannot advance while session is not_started");
    }
}
