use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use storage::repository::CredentialRepository;

use crate::api::{HttpQuizApi, ensure_success};
use crate::api::wire::{RegisterRequest, TokenDto};
use crate::config::ClientConfig;
use crate::error::{ApiError, AuthError};

/// The signed-in learner, as reported by `/api/users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Obtains and persists the bearer token used by `HttpQuizApi`.
#[derive(Clone)]
pub struct AuthService {
    client: Client,
    config: ClientConfig,
    credentials: Arc<dyn CredentialRepository>,
}

impl AuthService {
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the HTTP client cannot be constructed.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ApiError::Config(err.to_string()))?;
        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// The stored token, if any.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the credential store fails.
    pub async fn stored_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.credentials.load_token().await?)
    }

    /// Exchange username and password for a token and store it.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` for blank fields, before any request.
    /// - `AuthError::InvalidCredentials` when the server rejects them.
    /// - `AuthError::Api` / `Storage` for transport or persistence failures.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "username and password are required".into(),
            ));
        }

        let url = self.config.endpoint("api/auth/token")?;
        tracing::debug!(%url, username, "requesting token");
        let response = self
            .client
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(ApiError::from)?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST
        ) {
            return Err(AuthError::InvalidCredentials);
        }
        let token: TokenDto = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(ApiError::from)?;

        self.credentials.save_token(&token.access_token).await?;
        tracing::info!(username, "signed in");
        Ok(token.access_token)
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` for blank fields or when the server refuses
    ///   the registration (e.g. the username is taken).
    /// - `AuthError::Api` for transport failures.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AuthError> {
        let (username, email) = (username.trim(), email.trim());
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "username, email and password are required".into(),
            ));
        }

        let url = self.config.endpoint("api/auth/register")?;
        let response = self
            .client
            .post(url)
            .json(&RegisterRequest {
                username,
                email,
                password,
            })
            .send()
            .await
            .map_err(ApiError::from)?;
        match ensure_success(response).await {
            Ok(response) => Ok(response.json().await.map_err(ApiError::from)?),
            Err(ApiError::Server { status, detail }) if (400..500).contains(&status) => {
                Err(AuthError::Validation(detail))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Profile of the learner owning the stored token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api(ApiError::Authentication)` without a valid token.
    pub async fn me(&self) -> Result<UserProfile, AuthError> {
        let token = self
            .stored_token()
            .await?
            .ok_or(AuthError::Api(ApiError::Authentication))?;
        let url = self.config.endpoint("api/users/me")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(ApiError::from)?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(ApiError::Authentication.into());
        }
        Ok(ensure_success(response)
            .await?
            .json()
            .await
            .map_err(ApiError::from)?)
    }

    /// Forget the stored token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the credential store fails.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.credentials.clear_token().await?;
        tracing::info!("signed out");
        Ok(())
    }

    /// A quiz client carrying the stored token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` or `AuthError::Api` if the client cannot be built.
    pub async fn quiz_client(&self) -> Result<HttpQuizApi, AuthError> {
        let token = self.stored_token().await?;
        Ok(HttpQuizApi::new(self.config.clone())?.with_token(token))
    }
}
