use crate::api::client::ApiClient;
use crate::api::types::{counts_of, ApiCharacter};
use crate::core::error::ClientError;
use crate::models::character::{Character, CharacterId};
use crate::models::user::User;
use crate::stores::storage::{keys, Storage, StorageExt};
use crate::validation::forms::{validate_email, CredentialsForm, ResetForm};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Authenticated (or anonymous) session state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().map(|u| u.is_admin).unwrap_or(false)
    }
}

/// Result of a successful signup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub user: Option<User>,
    pub assigned_characters: Option<Vec<Character>>,
}

/// Login, signup, logout and password recovery.
///
/// The only state it owns is the bearer token in storage; the API client
/// picks it up on every authenticated call.
pub struct SessionManager {
    api: Arc<ApiClient>,
    storage: Arc<dyn Storage>,
}

impl SessionManager {
    pub fn new(api: Arc<ApiClient>, storage: Arc<dyn Storage>) -> Self {
        Self { api, storage }
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(keys::TOKEN)
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let credentials = CredentialsForm::new(email, password).validate_login()?;

        let response = self
            .api
            .login(&credentials.email, &credentials.password)
            .await
            .map_err(ClientError::into_auth)?;

        self.storage.set(keys::TOKEN, &response.access_token)?;

        let user = match self.me().await {
            Ok(user) => user,
            Err(e) => {
                // a token that cannot fetch its own user is useless
                self.logout();
                return Err(e);
            }
        };

        info!(user_id = user.id, is_admin = user.is_admin, "Logged in");

        Ok(Session {
            user: Some(user),
            token: Some(response.access_token),
        })
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Registration, ClientError> {
        let credentials = CredentialsForm::new(email, password).validate_signup()?;

        let response = self
            .api
            .register(&credentials.email, &credentials.password)
            .await?;

        if let Some(token) = &response.access_token {
            self.storage.set(keys::TOKEN, token)?;
        }

        let assigned = response.characters.map(|characters| self.cache_characters(characters));

        let user = match (response.user, response.id) {
            (Some(user), _) => Some(User::from(user)),
            (None, Some(id)) => Some(User::new(
                id,
                response.email.unwrap_or(credentials.email),
                false,
            )),
            (None, None) => None,
        };

        info!(
            user_id = ?user.as_ref().map(|u| u.id),
            assigned = assigned.as_ref().map(|c| c.len()).unwrap_or(0),
            "Registered"
        );

        Ok(Registration {
            user,
            assigned_characters: assigned,
        })
    }

    /// Fetch the current user and refresh the assignment caches
    pub async fn me(&self) -> Result<User, ClientError> {
        let api_user = self.api.me().await?;

        if let Some(ids) = &api_user.character_ids {
            if let Err(e) = self.storage.set_json(keys::ASSIGNED_CHARACTER_IDS, ids) {
                warn!(error = %e, "Failed to cache character IDs");
            }
        }

        if let Some(characters) = &api_user.characters {
            self.cache_counts(&counts_of(characters));
            self.cache_characters(characters.clone());
        }

        Ok(User::from(api_user))
    }

    /// Clear the token and every cached assignment. Never fails.
    pub fn logout(&self) {
        for key in keys::SESSION_SCOPED {
            if let Err(e) = self.storage.remove(key) {
                warn!(key = key, error = %e, "Failed to clear cached value on logout");
            }
        }
        info!("Logged out");
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String, ClientError> {
        let email = validate_email(email)?;
        let ack = self.api.forgot_password(&email).await?;
        Ok(ack
            .message
            .unwrap_or_else(|| "Check your email for a reset link.".to_string()))
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, ClientError> {
        let reset = ResetForm::new(token, new_password, confirm_password).validate()?;
        let ack = self
            .api
            .reset_password(&reset.token, &reset.new_password)
            .await?;
        Ok(ack
            .message
            .unwrap_or_else(|| "Password reset successfully.".to_string()))
    }

    /// Server counts cached from the last session payload
    pub fn cached_counts(&self) -> HashMap<CharacterId, u32> {
        self.storage
            .get_json(keys::MESSAGE_COUNTS)
            .unwrap_or_default()
    }

    fn cache_counts(&self, counts: &HashMap<CharacterId, u32>) {
        if counts.is_empty() {
            return;
        }
        if let Err(e) = self.storage.set_json(keys::MESSAGE_COUNTS, counts) {
            warn!(error = %e, "Failed to cache message counts");
        }
    }

    fn cache_characters(&self, characters: Vec<ApiCharacter>) -> Vec<Character> {
        let characters: Vec<Character> = characters.into_iter().map(Character::from).collect();
        if let Err(e) = self.storage.set_json(keys::ASSIGNED_CHARACTERS, &characters) {
            warn!(error = %e, "Failed to cache assigned characters");
        }
        characters
    }
}
