use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Question, QuestionId};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("score {score} is outside 0..={max_score}")]
    ScoreOutOfRange { score: f64, max_score: u32 },

    #[error("max_score must be greater than zero")]
    ZeroMaxScore,
}

/// How the server judged an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Verdict {
    /// Multiple choice: right or wrong, with the expected label.
    Choice {
        is_correct: bool,
        correct_answer: String,
    },
    /// Open-ended: graded on a percentage with textual feedback.
    Graded {
        percentage: f64,
        similarity: f64,
        feedback: String,
        technical_terms_found: Vec<String>,
        technical_bonus: u32,
    },
}

/// Server-graded verdict for one answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    question_id: QuestionId,
    score: f64,
    max_score: u32,
    verdict: Verdict,
    explanation: Option<String>,
}

impl SubmissionResult {
    /// Build a result from a graded score.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::ScoreOutOfRange` if `score` is not finite or not
    /// within `0..=max_score`, and `ZeroMaxScore` if `max_score` is zero.
    pub fn new(
        question_id: QuestionId,
        score: f64,
        max_score: u32,
        verdict: Verdict,
        explanation: Option<String>,
    ) -> Result<Self, SubmissionError> {
        if max_score == 0 {
            return Err(SubmissionError::ZeroMaxScore);
        }
        if !score.is_finite() || score < 0.0 || score > f64::from(max_score) {
            return Err(SubmissionError::ScoreOutOfRange { score, max_score });
        }
        Ok(Self {
            question_id,
            score,
            max_score,
            verdict,
            explanation,
        })
    }

    /// A multiple-choice verdict scores the full `max_score` when correct, nothing otherwise.
    #[must_use]
    pub fn from_choice(
        question: &Question,
        is_correct: bool,
        correct_answer: impl Into<String>,
        explanation: Option<String>,
    ) -> Self {
        let max_score = question.max_score();
        let score = if is_correct { f64::from(max_score) } else { 0.0 };
        Self {
            question_id: question.id(),
            score,
            max_score,
            verdict: Verdict::Choice {
                is_correct,
                correct_answer: correct_answer.into(),
            },
            explanation,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// `Some(true/false)` for multiple choice, `None` for graded answers.
    #[must_use]
    pub fn is_correct(&self) -> Option<bool> {
        match self.verdict {
            Verdict::Choice { is_correct, .. } => Some(is_correct),
            Verdict::Graded { .. } => None,
        }
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Graded { feedback, .. } => Some(feedback),
            Verdict::Choice { .. } => None,
        }
    }
}
