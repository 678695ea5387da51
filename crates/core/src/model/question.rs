use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::QuestionId;

/// Points a multiple-choice question is worth when the server does not say otherwise.
pub const DEFAULT_CHOICE_MAX_SCORE: u32 = 1;

/// Points an open-ended question is worth when the server does not say otherwise.
pub const DEFAULT_OPEN_MAX_SCORE: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt is empty")]
    EmptyPrompt,

    #[error("multiple-choice question has no choices")]
    NoChoices,

    #[error("duplicate choice label: {label}")]
    DuplicateLabel { label: String },

    #[error("max_score must be greater than zero")]
    ZeroMaxScore,
}

/// One labeled option of a multiple-choice question (`a`, `b`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub text: String,
}

impl Choice {
    #[must_use]
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// How a question is answered and graded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    MultipleChoice {
        choices: Vec<Choice>,
    },
    /// Free text, graded remotely against an expected answer.
    OpenEnded {
        expected_answer: String,
        technical_terms: Vec<String>,
    },
}

/// An immutable unit of assessment, fetched once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    kind: QuestionKind,
    max_score: u32,
    difficulty: Option<String>,
    category: Option<String>,
    explanation: Option<String>,
}

impl Question {
    /// Build a multiple-choice question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, there are no choices,
    /// two choices share a label (case-insensitively), or `max_score` is zero.
    pub fn multiple_choice(
        id: QuestionId,
        prompt: impl Into<String>,
        choices: Vec<Choice>,
        max_score: u32,
    ) -> Result<Self, QuestionError> {
        if choices.is_empty() {
            return Err(QuestionError::NoChoices);
        }
        for (idx, choice) in choices.iter().enumerate() {
            let clash = choices[..idx]
                .iter()
                .any(|earlier| earlier.label.eq_ignore_ascii_case(&choice.label));
            if clash {
                return Err(QuestionError::DuplicateLabel {
                    label: choice.label.clone(),
                });
            }
        }
        Self::build(id, prompt.into(), QuestionKind::MultipleChoice { choices }, max_score)
    }

    /// Build an open-ended question graded against `expected_answer`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank or `max_score` is zero.
    pub fn open_ended(
        id: QuestionId,
        prompt: impl Into<String>,
        expected_answer: impl Into<String>,
        technical_terms: Vec<String>,
        max_score: u32,
    ) -> Result<Self, QuestionError> {
        Self::build(
            id,
            prompt.into(),
            QuestionKind::OpenEnded {
                expected_answer: expected_answer.into(),
                technical_terms,
            },
            max_score,
        )
    }

    fn build(
        id: QuestionId,
        prompt: String,
        kind: QuestionKind,
        max_score: u32,
    ) -> Result<Self, QuestionError> {
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if max_score == 0 {
            return Err(QuestionError::ZeroMaxScore);
        }
        Ok(Self {
            id,
            prompt,
            kind,
            max_score,
            difficulty: None,
            category: None,
            explanation: None,
        })
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Option<String>) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: Option<String>) -> Self {
        self.explanation = explanation;
        self
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        match &self.kind {
            QuestionKind::MultipleChoice { choices } => choices,
            QuestionKind::OpenEnded { .. } => &[],
        }
    }

    #[must_use]
    pub fn is_multiple_choice(&self) -> bool {
        matches!(self.kind, QuestionKind::MultipleChoice { .. })
    }

    /// Returns the canonical label for `answer` if it names one of the choices.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Always `None` for open-ended questions.
    #[must_use]
    pub fn match_choice(&self, answer: &str) -> Option<&str> {
        let answer = answer.trim();
        self.choices()
            .iter()
            .find(|choice| choice.label.eq_ignore_ascii_case(answer))
            .map(|choice| choice.label.as_str())
    }
}
