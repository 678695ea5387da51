//! Network boundary for quiz operations.

mod http;
pub(crate) mod wire;

use async_trait::async_trait;
use quiz_core::model::{FinalResult, Question, SessionHandle, SessionStatus, SubmissionResult};

use crate::config::{QuizKind, StartConfig};
use crate::error::ApiError;

pub use http::HttpQuizApi;
pub(crate) use http::ensure_success;

/// Remote quiz API.
///
/// Implementations perform no storage or UI side effects; the session state
/// machine is their only caller in production code.
#[async_trait]
pub trait QuizApi: Send + Sync {
    fn kind(&self) -> QuizKind;

    /// The caller's unfinished session, if the server has one.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Authentication`, `Server` or `Network`.
    async fn active_session(&self) -> Result<Option<SessionHandle>, ApiError>;

    /// Create (or, without `force_new`, resume) a session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Authentication` without a usable credential,
    /// `Server` on non-2xx responses and `Network` on transport failure.
    async fn start(&self, config: &StartConfig) -> Result<SessionHandle, ApiError>;

    /// Ordered questions for `session`, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Same classes as [`QuizApi::start`], plus `Decode` for malformed questions.
    async fn fetch_questions(
        &self,
        session: &SessionHandle,
        limit: usize,
    ) -> Result<Vec<Question>, ApiError>;

    /// Submit `answer` for `question` and return the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidState` unless the session is in progress and
    /// `ApiError::Validation` for blank answers, both before any request.
    async fn submit_answer(
        &self,
        session: &SessionHandle,
        question: &Question,
        answer: &str,
    ) -> Result<SubmissionResult, ApiError>;

    /// Finalize `session`. A session the server already closed is a success.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for authentication, server or transport failures.
    async fn complete(&self, session: &SessionHandle) -> Result<FinalResult, ApiError>;
}

/// Local checks every submission passes before touching the network.
///
/// Returns the trimmed answer.
///
/// # Errors
///
/// Returns `ApiError::InvalidState` if the session is not in progress and
/// `ApiError::Validation` if the answer is blank.
pub fn precheck_submission<'a>(
    session: &SessionHandle,
    answer: &'a str,
) -> Result<&'a str, ApiError> {
    if session.status() != SessionStatus::InProgress {
        return Err(ApiError::InvalidState {
            status: session.status(),
        });
    }
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("answer must not be empty".into()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::SessionId;
    use quiz_core::time::fixed_now;

    #[test]
    fn precheck_trims_and_rejects_blank() {
        let session = SessionHandle::started(SessionId::new(1), fixed_now());
        assert_eq!(precheck_submission(&session, "  b \n").unwrap(), "b");
        assert!(matches!(
            precheck_submission(&session, " \t "),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn precheck_requires_in_progress() {
        let mut session = SessionHandle::started(SessionId::new(1), fixed_now());
        session.set_status(SessionStatus::AwaitingFeedback);
        assert!(matches!(
            precheck_submission(&session, "a"),
            Err(ApiError::InvalidState {
                status: SessionStatus::AwaitingFeedback
            })
        ));
    }
}
