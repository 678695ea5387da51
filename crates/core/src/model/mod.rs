mod ids;
mod question;
mod session;
mod submission;

pub use ids::{AttemptId, ExerciseId, ParseIdError, QuestionId, SessionId};
pub use question::{
    Choice, DEFAULT_CHOICE_MAX_SCORE, DEFAULT_OPEN_MAX_SCORE, Question, QuestionError,
    QuestionKind,
};
pub use session::{FinalResult, FinalSummary, SessionHandle, SessionStatus};
pub use submission::{SubmissionError, SubmissionResult, Verdict};
