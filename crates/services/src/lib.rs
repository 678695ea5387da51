#![forbid(unsafe_code)]

pub mod api;
pub mod auth_service;
pub mod config;
pub mod error;
pub mod progress_service;
pub mod sessions;

pub use quiz_core::Clock;

pub use api::{HttpQuizApi, QuizApi, precheck_submission};
pub use auth_service::{AuthService, UserProfile};
pub use config::{ClientConfig, QuizKind, StartConfig};
pub use error::{ApiError, AuthError, ErrorSeverity, ProgressServiceError, SessionAction, SessionError};
pub use progress_service::{CompletionOutcome, ProgressService};

pub use sessions::{
    Finalization, QuestionSequencer, QuizSession, QuizSummary, SessionEvent, SessionObserver,
    SessionProgress, SubmissionPipeline, TracingObserver,
};
