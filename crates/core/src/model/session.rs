use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{AttemptId, QuestionId, SessionId};

/// Lifecycle status of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    AwaitingFeedback,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::AwaitingFeedback => "awaiting_feedback",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exam attempt as known to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    id: SessionId,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    attempt: AttemptId,
}

impl SessionHandle {
    /// A freshly started session, as returned by the remote API.
    #[must_use]
    pub fn started(id: SessionId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SessionStatus::InProgress,
            created_at,
            attempt: AttemptId::generate(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Only the lifecycle state machine should call this.
    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }
}

/// Server-side summary of a finalized session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub session_id: SessionId,
    pub score: f64,
    pub total_questions: u32,
    pub percentage: f64,
    pub correct: Vec<QuestionId>,
    pub incorrect: Vec<QuestionId>,
}

/// Outcome of asking the server to finalize a session.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalResult {
    Confirmed(FinalSummary),
    /// The server had already closed this session; treated as success.
    AlreadyCompleted,
}

impl FinalResult {
    #[must_use]
    pub fn summary(&self) -> Option<&FinalSummary> {
        match self {
            FinalResult::Confirmed(summary) => Some(summary),
            FinalResult::AlreadyCompleted => None,
        }
    }
}
