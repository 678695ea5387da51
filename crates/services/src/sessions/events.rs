use quiz_core::model::{FinalResult, QuestionId, SessionId};

/// Lifecycle notifications emitted by `QuizSession`.
///
/// Observers render or log; they never drive transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started {
        session_id: SessionId,
        questions: usize,
    },
    AnswerRecorded {
        question_id: QuestionId,
        index: usize,
        score: f64,
        max_score: u32,
    },
    Advanced {
        index: usize,
    },
    Completed {
        session_id: SessionId,
        result: FinalResult,
    },
    FinalizationFailed {
        session_id: SessionId,
        reason: String,
    },
    Reset,
}

pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Writes every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Started {
                session_id,
                questions,
            } => tracing::info!(%session_id, questions, "quiz started"),
            SessionEvent::AnswerRecorded {
                question_id,
                index,
                score,
                max_score,
            } => tracing::debug!(%question_id, index, score, max_score, "answer recorded"),
            SessionEvent::Advanced { index } => tracing::debug!(index, "advanced"),
            SessionEvent::Completed { session_id, result } => match result.summary() {
                Some(summary) => tracing::info!(
                    %session_id,
                    percentage = summary.percentage,
                    "quiz completed"
                ),
                None => tracing::info!(%session_id, "quiz completed (already closed)"),
            },
            SessionEvent::FinalizationFailed { session_id, reason } => {
                tracing::warn!(%session_id, %reason, "finalization failed");
            }
            SessionEvent::Reset => tracing::debug!("session reset"),
        }
    }
}
