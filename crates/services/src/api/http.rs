use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use quiz_core::Clock;
use quiz_core::model::{FinalResult, FinalSummary, Question, SessionHandle, SubmissionResult};

use super::wire::{
    ChoiceFinalDto, ChoiceQuestionDto, ChoiceVerdictDto, GradedFinalDto, GradedVerdictDto,
    OpenQuestionDto, SessionDto, SubmitRequest, error_detail,
};
use super::{QuizApi, precheck_submission};
use crate::config::{ClientConfig, QuizKind, StartConfig};
use crate::error::ApiError;

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `QuizApi` over the learning hub's REST endpoints.
pub struct HttpQuizApi {
    client: Client,
    config: ClientConfig,
    token: RwLock<Option<String>>,
    clock: Clock,
}

impl HttpQuizApi {
    /// Build a client whose every request is bounded by `config.timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(MAX_CONNECT_TIMEOUT))
            .build()
            .map_err(|err| ApiError::Config(err.to_string()))?;
        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
            clock: Clock::default(),
        })
    }

    #[must_use]
    pub fn with_token(self, token: Option<String>) -> Self {
        self.set_token(token);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the bearer token used for subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        let token = token.filter(|value| !value.trim().is_empty());
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        self.current_token().is_some()
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn current_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}/{suffix}", self.config.kind.api_prefix())
    }

    /// Attach the bearer token and send; status is left to the caller.
    async fn dispatch(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.current_token().ok_or(ApiError::Authentication)?;
        let response = request.bearer_auth(token).send().await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(ApiError::Authentication);
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = ensure_success(self.dispatch(request).await?).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Turn a non-2xx response into `ApiError::Server` carrying the body's `detail`.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Server {
        status: status.as_u16(),
        detail: error_detail(&body),
    })
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    fn kind(&self) -> QuizKind {
        self.config.kind
    }

    async fn active_session(&self) -> Result<Option<SessionHandle>, ApiError> {
        let url = self.config.endpoint(&self.path("sessions/active"))?;
        tracing::debug!(%url, "fetching active session");
        let response = self.dispatch(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let dto: SessionDto = ensure_success(response).await?.json().await?;
        Ok(Some(dto.into_handle(self.clock.now())))
    }

    async fn start(&self, config: &StartConfig) -> Result<SessionHandle, ApiError> {
        let mut url = self.config.endpoint(&self.path("start"))?;
        if config.force_new {
            url.query_pairs_mut().append_pair("force_new", "true");
        }
        tracing::debug!(%url, "starting session");
        let dto: SessionDto = self.send_json(self.client.post(url)).await?;
        let handle = dto.into_handle(self.clock.now());
        tracing::info!(session_id = %handle.id(), kind = %self.config.kind, "session started");
        Ok(handle)
    }

    async fn fetch_questions(
        &self,
        session: &SessionHandle,
        limit: usize,
    ) -> Result<Vec<Question>, ApiError> {
        let questions = match self.config.kind {
            QuizKind::MultipleChoice => {
                let mut url = self.config.endpoint(&self.path("questions"))?;
                url.query_pairs_mut()
                    .append_pair("limit", &limit.to_string());
                let dtos: Vec<ChoiceQuestionDto> = self.send_json(self.client.get(url)).await?;
                dtos.into_iter()
                    .map(Question::try_from)
                    .collect::<Result<Vec<_>, _>>()?
            }
            QuizKind::OpenEnded => {
                let url = self.config.endpoint(&self.path("ai-questions"))?;
                let dtos: Vec<OpenQuestionDto> = self.send_json(self.client.get(url)).await?;
                dtos.into_iter()
                    .take(limit)
                    .map(Question::try_from)
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        tracing::debug!(
            session_id = %session.id(),
            count = questions.len(),
            "questions fetched"
        );
        Ok(questions)
    }

    async fn submit_answer(
        &self,
        session: &SessionHandle,
        question: &Question,
        answer: &str,
    ) -> Result<SubmissionResult, ApiError> {
        let answer = precheck_submission(session, answer)?;
        let url = self.config.endpoint(&self.path("submit-answer"))?;
        let body = SubmitRequest {
            session_id: session.id().value(),
            question_id: question.id().value(),
            user_answer: answer,
        };
        tracing::debug!(
            session_id = %session.id(),
            question_id = %question.id(),
            "submitting answer"
        );
        let request = self.client.post(url).json(&body);
        match self.config.kind {
            QuizKind::MultipleChoice => {
                let dto: ChoiceVerdictDto = self.send_json(request).await?;
                Ok(dto.into_result(question))
            }
            QuizKind::OpenEnded => {
                let dto: GradedVerdictDto = self.send_json(request).await?;
                dto.into_result(question)
            }
        }
    }

    async fn complete(&self, session: &SessionHandle) -> Result<FinalResult, ApiError> {
        let url = match self.config.kind {
            QuizKind::MultipleChoice => self
                .config
                .endpoint(&self.path(&format!("complete/{}", session.id())))?,
            QuizKind::OpenEnded => {
                let mut url = self.config.endpoint(&self.path("complete"))?;
                url.query_pairs_mut()
                    .append_pair("session_id", &session.id().to_string());
                url
            }
        };
        tracing::debug!(%url, "completing session");
        let response = self.dispatch(self.client.post(url)).await?;
        // The server answers 404 for sessions it has already closed.
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::CONFLICT
        ) {
            tracing::info!(session_id = %session.id(), "session was already completed");
            return Ok(FinalResult::AlreadyCompleted);
        }
        let response = ensure_success(response).await?;
        let summary: FinalSummary = match self.config.kind {
            QuizKind::MultipleChoice => response.json::<ChoiceFinalDto>().await?.into(),
            QuizKind::OpenEnded => response.json::<GradedFinalDto>().await?.into(),
        };
        Ok(FinalResult::Confirmed(summary))
    }
}
