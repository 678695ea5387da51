//! JSON shapes exchanged with the learning hub API.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use quiz_core::model::{
    Choice, DEFAULT_CHOICE_MAX_SCORE, DEFAULT_OPEN_MAX_SCORE, FinalSummary, Question, QuestionId,
    SessionHandle, SessionId, SubmissionResult, Verdict,
};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub(crate) struct SessionDto {
    pub id: u64,
    #[serde(default)]
    pub started_at: Option<String>,
}

impl SessionDto {
    pub(crate) fn into_handle(self, fallback_now: DateTime<Utc>) -> SessionHandle {
        let created_at = self
            .started_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(fallback_now);
        SessionHandle::started(SessionId::new(self.id), created_at)
    }
}

/// Accepts RFC 3339 and the offset-less form the server emits for naive datetimes.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceQuestionDto {
    pub id: u64,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl TryFrom<ChoiceQuestionDto> for Question {
    type Error = ApiError;

    fn try_from(dto: ChoiceQuestionDto) -> Result<Self, Self::Error> {
        let choices = vec![
            Choice::new("a", dto.option_a),
            Choice::new("b", dto.option_b),
            Choice::new("c", dto.option_c),
            Choice::new("d", dto.option_d),
        ];
        Ok(Question::multiple_choice(
            QuestionId::new(dto.id),
            dto.question_text,
            choices,
            DEFAULT_CHOICE_MAX_SCORE,
        )?
        .with_explanation(dto.explanation)
        .with_difficulty(dto.difficulty)
        .with_category(dto.category))
    }
}

fn default_open_max_score() -> u32 {
    DEFAULT_OPEN_MAX_SCORE
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenQuestionDto {
    pub question_id: u64,
    pub question_text: String,
    pub expected_answer: String,
    #[serde(default)]
    pub technical_terms: Vec<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_open_max_score")]
    pub max_score: u32,
}

impl TryFrom<OpenQuestionDto> for Question {
    type Error = ApiError;

    fn try_from(dto: OpenQuestionDto) -> Result<Self, Self::Error> {
        Ok(Question::open_ended(
            QuestionId::new(dto.question_id),
            dto.question_text,
            dto.expected_answer,
            dto.technical_terms,
            dto.max_score,
        )?
        .with_explanation(dto.explanation)
        .with_difficulty(dto.difficulty)
        .with_category(dto.category))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitRequest<'a> {
    pub session_id: u64,
    pub question_id: u64,
    pub user_answer: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceVerdictDto {
    pub is_correct: bool,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl ChoiceVerdictDto {
    pub(crate) fn into_result(self, question: &Question) -> SubmissionResult {
        SubmissionResult::from_choice(
            question,
            self.is_correct,
            self.correct_answer,
            self.explanation,
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GradedVerdictDto {
    pub score: f64,
    pub max_score: u32,
    pub percentage: f64,
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub technical_terms_found: Vec<String>,
    #[serde(default)]
    pub technical_bonus: u32,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub detailed_explanation: Option<String>,
}

impl GradedVerdictDto {
    pub(crate) fn into_result(self, question: &Question) -> Result<SubmissionResult, ApiError> {
        Ok(SubmissionResult::new(
            question.id(),
            self.score,
            self.max_score,
            Verdict::Graded {
                percentage: self.percentage,
                similarity: self.similarity,
                feedback: self.feedback,
                technical_terms_found: self.technical_terms_found,
                technical_bonus: self.technical_bonus,
            },
            self.detailed_explanation,
        )?)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceFinalDto {
    pub session_id: u64,
    pub score: f64,
    pub total_questions: u32,
    pub percentage: f64,
    #[serde(default)]
    pub correct_answers: Vec<u64>,
    #[serde(default)]
    pub incorrect_answers: Vec<u64>,
}

impl From<ChoiceFinalDto> for FinalSummary {
    fn from(dto: ChoiceFinalDto) -> Self {
        FinalSummary {
            session_id: SessionId::new(dto.session_id),
            score: dto.score,
            total_questions: dto.total_questions,
            percentage: dto.percentage,
            correct: dto.correct_answers.into_iter().map(QuestionId::new).collect(),
            incorrect: dto
                .incorrect_answers
                .into_iter()
                .map(QuestionId::new)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GradedFinalDto {
    pub session_id: u64,
    pub total_score: f64,
    pub total_questions: u32,
    pub average_percentage: f64,
}

impl From<GradedFinalDto> for FinalSummary {
    fn from(dto: GradedFinalDto) -> Self {
        FinalSummary {
            session_id: SessionId::new(dto.session_id),
            score: dto.total_score,
            total_questions: dto.total_questions,
            percentage: dto.average_percentage,
            correct: Vec::new(),
            incorrect: Vec::new(),
        }
    }
}

/// FastAPI error body. `detail` is a string for `HTTPException` and a list
/// for validation failures.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

pub(crate) fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(text),
        }) => text,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "request failed".into(),
        Err(_) => body.trim().to_owned(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenDto {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}
