use quiz_core::model::Question;

use crate::error::SessionError;

/// Tracks which question of a loaded set is active.
///
/// The index only moves forward; `reset` is reserved for the state machine so
/// that rewinding always happens together with clearing the results.
#[derive(Debug, Clone, Default)]
pub struct QuestionSequencer {
    questions: Vec<Question>,
    index: usize,
}

impl QuestionSequencer {
    /// Load an ordered question set, starting at the first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyQuestionSet` if `questions` is empty.
    pub fn load(questions: Vec<Question>) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::EmptyQuestionSet);
        }
        Ok(Self {
            questions,
            index: 0,
        })
    }

    /// The active question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` when nothing is loaded or the set is exhausted.
    pub fn current(&self) -> Result<&Question, SessionError> {
        self.questions
            .get(self.index)
            .ok_or(SessionError::OutOfRange {
                index: self.index,
                len: self.questions.len(),
            })
    }

    /// Move to the next question. Returns `false` (and parks the index past
    /// the end) once no question remains.
    pub fn advance(&mut self) -> bool {
        if self.index + 1 < self.questions.len() {
            self.index += 1;
            true
        } else {
            self.index = self.questions.len();
            false
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.questions.len()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.index >= self.questions.len()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Rewind to index 0 and unload the question set.
    pub(crate) fn reset(&mut self) {
        self.index = 0;
        self.questions.clear();
    }
}
