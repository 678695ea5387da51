use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{FinalResult, FinalSummary, Question, SessionHandle, SessionStatus, SubmissionResult};
use quiz_core::scoring::{PerformanceTier, ScoreBoard};
use quiz_core::Clock;

use super::events::{SessionEvent, SessionObserver};
use super::pipeline::{PendingSubmission, SubmissionPipeline};
use super::progress::SessionProgress;
use super::sequencer::QuestionSequencer;
use crate::api::QuizApi;
use crate::config::StartConfig;
use crate::error::{ApiError, SessionAction, SessionError};

//
// ─── FINALIZATION ──────────────────────────────────────────────────────────────
//

/// What happened when the session was finalized server-side.
#[derive(Debug, Clone, PartialEq)]
pub enum Finalization {
    Confirmed(FinalSummary),
    AlreadyCompleted,
    /// The completion request failed; local results remain authoritative.
    Failed(String),
}

impl Finalization {
    #[must_use]
    pub fn summary(&self) -> Option<&FinalSummary> {
        match self {
            Finalization::Confirmed(summary) => Some(summary),
            Finalization::AlreadyCompleted | Finalization::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Finalization::Failed(_))
    }
}

impl From<FinalResult> for Finalization {
    fn from(result: FinalResult) -> Self {
        match result {
            FinalResult::Confirmed(summary) => Finalization::Confirmed(summary),
            FinalResult::AlreadyCompleted => Finalization::AlreadyCompleted,
        }
    }
}

/// Snapshot for the results screen.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSummary {
    pub answered: usize,
    pub total_questions: usize,
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub tier: PerformanceTier,
    pub correct: usize,
    pub incorrect: usize,
    pub elapsed: Duration,
    pub finalization: Option<Finalization>,
}

//
// ─── SUBMISSION HALVES ─────────────────────────────────────────────────────────
//

/// A validated submission, detached from the session so the request can run
/// while the caller keeps ownership of `QuizSession`.
pub struct PreparedSubmission {
    api: Arc<dyn QuizApi>,
    handle: SessionHandle,
    question: Question,
    pending: PendingSubmission,
}

impl PreparedSubmission {
    #[must_use]
    pub fn pending(&self) -> &PendingSubmission {
        &self.pending
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Send the answer. Never touches session state.
    pub async fn send(self) -> SubmissionOutcome {
        let result = self
            .api
            .submit_answer(&self.handle, &self.question, self.pending.answer())
            .await;
        SubmissionOutcome {
            pending: self.pending,
            result,
        }
    }
}

/// The verdict (or failure) for a `PreparedSubmission`.
pub struct SubmissionOutcome {
    pub pending: PendingSubmission,
    pub result: Result<SubmissionResult, ApiError>,
}

//
// ─── STATE MACHINE ─────────────────────────────────────────────────────────────
//

/// Everything that belongs to one attempt. Cleared in one step on reset so the
/// index, results and in-flight slot can never disagree.
#[derive(Debug, Clone, Default)]
struct AttemptState {
    sequencer: QuestionSequencer,
    pipeline: SubmissionPipeline,
    finalization: Option<Finalization>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl AttemptState {
    fn reset(&mut self) {
        self.sequencer.reset();
        self.pipeline = SubmissionPipeline::default();
        self.finalization = None;
        self.started_at = None;
        self.completed_at = None;
    }
}

/// Lifecycle of one quiz attempt:
///
/// ```text
/// NotStarted --start--> InProgress --submit--> AwaitingFeedback
/// AwaitingFeedback --advance--> InProgress | Completed
/// Completed --retake--> NotStarted
/// InProgress | AwaitingFeedback --abandon--> NotStarted
/// ```
pub struct QuizSession {
    api: Arc<dyn QuizApi>,
    clock: Clock,
    status: SessionStatus,
    handle: Option<SessionHandle>,
    state: AttemptState,
    observers: Vec<Arc<dyn SessionObserver>>,
    shuffle: bool,
}

impl QuizSession {
    #[must_use]
    pub fn new(api: Arc<dyn QuizApi>) -> Self {
        Self {
            api,
            clock: Clock::default(),
            status: SessionStatus::NotStarted,
            handle: None,
            state: AttemptState::default(),
            observers: Vec::new(),
            shuffle: false,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Shuffle the fetched questions locally before the first one is shown.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn subscribe(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    // ─── Queries ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn handle(&self) -> Option<&SessionHandle> {
        self.handle.as_ref()
    }

    /// The question awaiting an answer or showing feedback.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.status {
            SessionStatus::InProgress | SessionStatus::AwaitingFeedback => {
                self.state.sequencer.current().ok()
            }
            SessionStatus::NotStarted | SessionStatus::Completed => None,
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        self.state.sequencer.questions()
    }

    #[must_use]
    pub fn results(&self) -> &[SubmissionResult] {
        self.state.pipeline.results()
    }

    /// Verdict for the current question, once it has arrived.
    #[must_use]
    pub fn last_result(&self) -> Option<&SubmissionResult> {
        match self.status {
            SessionStatus::AwaitingFeedback => self.results().last(),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.state.sequencer.has_next()
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.state.pipeline.is_in_flight()
    }

    #[must_use]
    pub fn scoreboard(&self) -> ScoreBoard<'_> {
        ScoreBoard::new(self.results())
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::compute(
            self.state.sequencer.len(),
            self.state.sequencer.index(),
            self.results().len(),
        )
    }

    #[must_use]
    pub fn finalization(&self) -> Option<&Finalization> {
        self.state.finalization.as_ref()
    }

    /// Score and timing for the current attempt; `None` before `start`.
    #[must_use]
    pub fn summary(&self) -> Option<QuizSummary> {
        let started_at = self.state.started_at?;
        let elapsed = match self.state.completed_at {
            Some(done) => (done - started_at).max(Duration::zero()),
            None => self.clock.elapsed_since(started_at),
        };
        let board = self.scoreboard();
        Some(QuizSummary {
            answered: board.answered(),
            total_questions: self.state.sequencer.len(),
            total_score: board.total_score(),
            max_score: board.max_score(),
            percentage: board.percentage(),
            tier: board.tier(),
            correct: board.correct_count(),
            incorrect: board.incorrect_count(),
            elapsed,
            finalization: self.state.finalization.clone(),
        })
    }

    // ─── Transitions ───────────────────────────────────────────────────────

    /// Open a session and load its questions.
    ///
    /// # Errors
    ///
    /// - `SessionError::IllegalTransition` unless the session is `NotStarted`.
    /// - `SessionError::EmptyQuestionSet` if the server returned no questions.
    /// - `SessionError::Api` for client failures.
    ///
    /// On error the session stays `NotStarted`.
    pub async fn start(&mut self, config: &StartConfig) -> Result<&SessionHandle, SessionError> {
        self.require(&[SessionStatus::NotStarted], SessionAction::Start)?;

        let handle = self.api.start(config).await?;
        let mut questions = self
            .api
            .fetch_questions(&handle, config.question_limit)
            .await?;
        if self.shuffle {
            questions.as_mut_slice().shuffle(&mut rng());
        }
        let sequencer = QuestionSequencer::load(questions)?;
        let question_count = sequencer.len();

        self.state = AttemptState {
            sequencer,
            started_at: Some(self.clock.now()),
            ..AttemptState::default()
        };
        self.status = SessionStatus::InProgress;
        let session_id = handle.id();
        let handle = self.handle.insert(handle);
        for observer in &self.observers {
            observer.on_event(&SessionEvent::Started {
                session_id,
                questions: question_count,
            });
        }
        Ok(handle)
    }

    /// Validate `answer` for the current question and claim the in-flight slot.
    ///
    /// # Errors
    ///
    /// - `SessionError::IllegalTransition` unless `InProgress`.
    /// - `SessionError::Validation` / `SubmissionInFlight` from the pipeline.
    pub fn begin_submission(&mut self, answer: &str) -> Result<PreparedSubmission, SessionError> {
        self.require(&[SessionStatus::InProgress], SessionAction::Submit)?;
        let handle = self.handle.clone().ok_or(SessionError::IllegalTransition {
            from: self.status,
            action: SessionAction::Submit,
        })?;
        let question = self.state.sequencer.current()?.clone();
        let index = self.state.sequencer.index();
        let pending = self
            .state
            .pipeline
            .begin(handle.attempt(), index, &question, answer)?;
        Ok(PreparedSubmission {
            api: Arc::clone(&self.api),
            handle,
            question,
            pending,
        })
    }

    /// Apply the outcome of a `PreparedSubmission`.
    ///
    /// # Errors
    ///
    /// - `SessionError::StaleSubmission` if the session was reset since the
    ///   submission began; the verdict is dropped.
    /// - `SessionError::Api` if the request failed; results and status are unchanged.
    pub fn finish_submission(
        &mut self,
        outcome: SubmissionOutcome,
    ) -> Result<&SubmissionResult, SessionError> {
        let SubmissionOutcome { pending, result } = outcome;
        let current_attempt = self.handle.as_ref().map(SessionHandle::attempt);
        if current_attempt != Some(pending.attempt())
            || self.state.pipeline.in_flight() != Some(&pending)
        {
            tracing::debug!(
                question_id = %pending.question_id(),
                "dropping verdict for a previous attempt"
            );
            return Err(SessionError::StaleSubmission);
        }

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                self.state.pipeline.abort();
                tracing::debug!(error = %err, "submission failed");
                return Err(err.into());
            }
        };

        let index = pending.index();
        let event = SessionEvent::AnswerRecorded {
            question_id: result.question_id(),
            index,
            score: result.score(),
            max_score: result.max_score(),
        };
        self.state.pipeline.record(&pending, result)?;
        self.set_status(SessionStatus::AwaitingFeedback);
        self.emit(&event);

        self.results().get(index).ok_or(SessionError::OutOfRange {
            index,
            len: self.results().len(),
        })
    }

    /// Submit an answer for the current question and wait for the verdict.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::begin_submission`] and [`QuizSession::finish_submission`].
    pub async fn submit_answer(&mut self, answer: &str) -> Result<&SubmissionResult, SessionError> {
        let prepared = self.begin_submission(answer)?;
        let outcome = prepared.send().await;
        self.finish_submission(outcome)
    }

    /// Move past the feedback for the current question.
    ///
    /// Returns `true` if another question is now active. After the last
    /// question the session is finalized and `Completed`, even when the
    /// completion request fails.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IllegalTransition` unless `AwaitingFeedback` or `Completed`.
    pub async fn advance(&mut self) -> Result<bool, SessionError> {
        match self.status {
            SessionStatus::Completed => Ok(false),
            SessionStatus::AwaitingFeedback => {
                if self.state.sequencer.advance() {
                    self.set_status(SessionStatus::InProgress);
                    let index = self.state.sequencer.index();
                    self.emit(&SessionEvent::Advanced { index });
                    Ok(true)
                } else {
                    self.finalize().await;
                    Ok(false)
                }
            }
            from => Err(SessionError::IllegalTransition {
                from,
                action: SessionAction::Advance,
            }),
        }
    }

    /// Discard a completed attempt so a new one can be started.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IllegalTransition` unless `Completed`.
    pub fn retake(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionStatus::Completed], SessionAction::Retake)?;
        self.reset();
        Ok(())
    }

    /// Walk away from an unfinished attempt. Any verdict still in flight is
    /// dropped when it arrives.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IllegalTransition` unless `InProgress` or `AwaitingFeedback`.
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        self.require(
            &[SessionStatus::InProgress, SessionStatus::AwaitingFeedback],
            SessionAction::Abandon,
        )?;
        self.reset();
        Ok(())
    }

    // ─── Internals ─────────────────────────────────────────────────────────

    fn require(&self, allowed: &[SessionStatus], action: SessionAction) -> Result<(), SessionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(SessionError::IllegalTransition {
                from: self.status,
                action,
            })
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        if let Some(handle) = self.handle.as_mut() {
            handle.set_status(status);
        }
    }

    fn emit(&self, event: &SessionEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    async fn finalize(&mut self) {
        let Some(handle) = self.handle.clone() else {
            self.set_status(SessionStatus::Completed);
            return;
        };
        let session_id = handle.id();
        let (finalization, event) = match self.api.complete(&handle).await {
            Ok(result) => {
                let event = SessionEvent::Completed {
                    session_id,
                    result: result.clone(),
                };
                (Finalization::from(result), event)
            }
            Err(err) => {
                tracing::warn!(%session_id, error = %err, "could not finalize session");
                let reason = err.to_string();
                (
                    Finalization::Failed(reason.clone()),
                    SessionEvent::FinalizationFailed { session_id, reason },
                )
            }
        };
        self.state.finalization = Some(finalization);
        self.state.completed_at = Some(self.clock.now());
        self.set_status(SessionStatus::Completed);
        self.emit(&event);
    }

    fn reset(&mut self) {
        self.state.reset();
        self.handle = None;
        self.status = SessionStatus::NotStarted;
        self.emit(&SessionEvent::Reset);
    }
}
