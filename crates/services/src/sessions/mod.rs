//! Quiz session orchestration: sequencing, submission and lifecycle.

mod events;
mod machine;
mod pipeline;
mod progress;
mod sequencer;

pub use events::{SessionEvent, SessionObserver, TracingObserver};
pub use machine::{Finalization, PreparedSubmission, QuizSession, QuizSummary, SubmissionOutcome};
pub use pipeline::{PendingSubmission, SubmissionPipeline};
pub use progress::SessionProgress;
pub use sequencer::QuestionSequencer;
