use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_QUESTION_LIMIT: usize = 10;

/// Which quiz flavour a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizKind {
    /// Four labeled options, graded right/wrong (`/api/quiz`).
    #[default]
    MultipleChoice,
    /// Free-text answers graded remotely (`/api/ai-quiz`).
    OpenEnded,
}

impl QuizKind {
    #[must_use]
    pub fn api_prefix(self) -> &'static str {
        match self {
            QuizKind::MultipleChoice => "api/quiz",
            QuizKind::OpenEnded => "api/ai-quiz",
        }
    }
}

impl fmt::Display for QuizKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizKind::MultipleChoice => f.write_str("choice"),
            QuizKind::OpenEnded => f.write_str("open"),
        }
    }
}

impl FromStr for QuizKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "choice" | "mc" | "multiple-choice" => Ok(QuizKind::MultipleChoice),
            "open" | "ai" | "open-ended" => Ok(QuizKind::OpenEnded),
            other => Err(format!("unknown quiz kind: {other}")),
        }
    }
}

/// Connection settings for the remote learning hub API.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: Url,
    pub kind: QuizKind,
    pub timeout: Duration,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns `ApiError::Config` if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, kind: QuizKind) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            kind,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Read `HOLBIES_API_URL`, `HOLBIES_QUIZ_KIND` and `HOLBIES_TIMEOUT_SECS`,
    /// falling back to defaults for anything unset or unparsable.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if `HOLBIES_API_URL` is set but invalid.
    pub fn from_env() -> Result<Self, ApiError> {
        let base_url = env::var("HOLBIES_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let kind = env::var("HOLBIES_QUIZ_KIND")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        let timeout = env::var("HOLBIES_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);
        Ok(Self::new(&base_url, kind)?.with_timeout(timeout))
    }

    /// # Errors
    ///
    /// Returns `ApiError::Config` if `base_url` is not an absolute http(s) URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ApiError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: QuizKind) -> Self {
        self.kind = kind;
        self
    }

    /// Join `path` (no leading slash) onto the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Config(err.to_string()))
    }
}

/// Options for starting a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartConfig {
    pub question_limit: usize,
    /// Close any active session server-side and open a new one.
    pub force_new: bool,
}

impl Default for StartConfig {
    fn default() -> Self {
        Self {
            question_limit: DEFAULT_QUESTION_LIMIT,
            force_new: false,
        }
    }
}

impl StartConfig {
    /// Reads `HOLBIES_QUESTION_LIMIT`.
    #[must_use]
    pub fn from_env() -> Self {
        let question_limit = env::var("HOLBIES_QUESTION_LIMIT")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_QUESTION_LIMIT);
        Self {
            question_limit,
            force_new: false,
        }
    }

    #[must_use]
    pub fn with_force_new(mut self, force_new: bool) -> Self {
        self.force_new = force_new;
        self
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    // Url::join drops the last path segment unless the base ends with '/'.
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&normalized).map_err(|err| ApiError::Config(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::Config(format!("unsupported scheme: {other}"))),
    }
}
