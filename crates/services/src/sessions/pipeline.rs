use quiz_core::model::{AttemptId, Question, QuestionId, SubmissionResult};

use crate::error::SessionError;

/// A submission that has passed local validation and is awaiting its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    attempt: AttemptId,
    question_id: QuestionId,
    index: usize,
    answer: String,
}

impl PendingSubmission {
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }
}

/// Ordered results plus the single in-flight slot.
///
/// Results are append-only and positional: result `i` always belongs to
/// question `i` of the sequencer.
#[derive(Debug, Clone, Default)]
pub struct SubmissionPipeline {
    results: Vec<SubmissionResult>,
    in_flight: Option<PendingSubmission>,
}

impl SubmissionPipeline {
    /// Validate `answer` against `question` and claim the in-flight slot.
    ///
    /// # Errors
    ///
    /// - `SessionError::SubmissionInFlight` if another submission is pending.
    /// - `SessionError::Validation` for a blank answer or an unknown choice label.
    /// - `SessionError::OutOfRange` if `index` was already answered.
    pub fn begin(
        &mut self,
        attempt: AttemptId,
        index: usize,
        question: &Question,
        answer: &str,
    ) -> Result<PendingSubmission, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::SubmissionInFlight);
        }
        if index != self.results.len() {
            return Err(SessionError::OutOfRange {
                index,
                len: self.results.len(),
            });
        }
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            return Err(SessionError::Validation("answer must not be empty".into()));
        }
        let answer = if question.is_multiple_choice() {
            question
                .match_choice(trimmed)
                .ok_or_else(|| {
                    SessionError::Validation(format!("'{trimmed}' is not one of the choices"))
                })?
                .to_owned()
        } else {
            trimmed.to_owned()
        };

        let pending = PendingSubmission {
            attempt,
            question_id: question.id(),
            index,
            answer,
        };
        self.in_flight = Some(pending.clone());
        Ok(pending)
    }

    /// Release the in-flight slot without recording anything.
    pub fn abort(&mut self) {
        self.in_flight = None;
    }

    /// Append the verdict for `pending`, releasing the in-flight slot.
    ///
    /// # Errors
    ///
    /// - `SessionError::StaleSubmission` if `pending` is not the submission in flight.
    /// - `SessionError::QuestionMismatch` if the verdict names another question.
    pub fn record(
        &mut self,
        pending: &PendingSubmission,
        result: SubmissionResult,
    ) -> Result<&SubmissionResult, SessionError> {
        if self.in_flight.as_ref() != Some(pending) {
            return Err(SessionError::StaleSubmission);
        }
        self.in_flight = None;
        if result.question_id() != pending.question_id {
            return Err(SessionError::QuestionMismatch {
                expected: pending.question_id,
                actual: result.question_id(),
            });
        }
        if pending.index != self.results.len() {
            return Err(SessionError::OutOfRange {
                index: pending.index,
                len: self.results.len(),
            });
        }
        self.results.push(result);
        Ok(&self.results[pending.index])
    }

    #[must_use]
    pub fn results(&self) -> &[SubmissionResult] {
        &self.results
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&PendingSubmission> {
        self.in_flight.as_ref()
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}
