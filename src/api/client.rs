use crate::api::types::{
    Ack, ApiCharacter, ApiUser, CharacterList, ConversationList, CredentialsRequest,
    ForgotPasswordRequest, HistoryResponse, LoginResponse, MessageList, RegisterResponse,
    ResetPasswordRequest, RoleRequest, SendRequest, SendResponse, SurveyStatus,
};
use crate::core::error::ClientError;
use crate::models::character::CharacterId;
use crate::stores::storage::{keys, Storage};
use anyhow::Context;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// API client for the chat backend.
///
/// The bearer token is read from storage at call time, so a login or logout
/// is visible to the next request without rebuilding the client.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    storage: Arc<dyn Storage>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        storage: Arc<dyn Storage>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            storage,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.client.get(self.url(path)), path, true)
            .await
    }

    async fn post<B, T>(&self, path: &str, body: &B, authenticated: bool) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.client.post(self.url(path)).json(body), path, authenticated)
            .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
        authenticated: bool,
    ) -> Result<T, ClientError> {
        let builder = match self.storage.get(keys::TOKEN) {
            Some(token) if authenticated => builder.bearer_auth(token),
            _ => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        debug!(path = path, status = status.as_u16(), "Backend responded");

        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Auth(if body.is_empty() {
                "Not authenticated".to_string()
            } else {
                body
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(format!("{}: {}", path, e)))
    }

    // auth

    pub async fn register(&self, email: &str, password: &str) -> Result<RegisterResponse, ClientError> {
        self.post("/auth/register", &CredentialsRequest { email, password }, false)
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        self.post("/auth/login", &CredentialsRequest { email, password }, false)
            .await
    }

    pub async fn me(&self) -> Result<ApiUser, ClientError> {
        if self.storage.get(keys::TOKEN).is_none() {
            return Err(ClientError::Auth("No session token".to_string()));
        }
        self.get("/auth/me").await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Ack, ClientError> {
        self.post("/auth/forgot-password", &ForgotPasswordRequest { email }, false)
            .await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<Ack, ClientError> {
        self.post(
            "/auth/reset-password",
            &ResetPasswordRequest { token, new_password },
            false,
        )
        .await
    }

    // characters

    /// Character list from any of the assignment endpoints
    pub async fn characters_at(&self, path: &str) -> Result<Vec<ApiCharacter>, ClientError> {
        let list: CharacterList = self.get(path).await?;
        Ok(list.into_vec())
    }

    pub async fn character(&self, id: CharacterId) -> Result<ApiCharacter, ClientError> {
        self.get(&format!("/characters/{}", id)).await
    }

    // chat

    pub async fn send_message(
        &self,
        path: &str,
        character_id: CharacterId,
        text: &str,
    ) -> Result<SendResponse, ClientError> {
        self.post(
            path,
            &SendRequest {
                character_id,
                user_message: text,
            },
            true,
        )
        .await
    }

    pub async fn chat_history(&self, character_id: CharacterId) -> Result<HistoryResponse, ClientError> {
        self.get(&format!("/chat/{}", character_id)).await
    }

    pub async fn survey_status(&self) -> Result<SurveyStatus, ClientError> {
        self.get("/survey-status").await
    }

    // admin

    pub async fn admin_conversations(&self) -> Result<ConversationList, ClientError> {
        self.get("/admin/conversations").await
    }

    pub async fn admin_conversation_messages(&self, conversation_id: u32) -> Result<MessageList, ClientError> {
        self.get(&format!("/admin/conversations/{}/messages", conversation_id))
            .await
    }

    pub async fn set_admin_role(&self, user_id: u32, is_admin: bool) -> Result<Ack, ClientError> {
        self.post(
            &format!("/admin/users/{}/role", user_id),
            &RoleRequest { is_admin },
            true,
        )
        .await
    }
}
