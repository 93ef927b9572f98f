use crate::api::client::ApiClient;
use crate::chat::transport::ChatTransport;
use crate::core::config::Config;
use crate::core::error::ClientError;
use crate::core::state::{Action, ClientState};
use crate::models::admin::ConversationSummary;
use crate::models::character::{Character, CharacterId};
use crate::models::message::Message;
use crate::models::user::User;
use crate::router::routes::{Resolution, View};
use crate::session::manager::{Session, SessionManager};
use crate::session::resolver::CharacterResolver;
use crate::stores::storage::{keys, Storage, StorageExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The client: owns the state and runs every user-facing operation.
///
/// Backend calls never hold the state lock. Any authentication failure
/// clears the session and lands on the login view after
/// `session.auth_redirect_delay_ms`.
pub struct App {
    config: Config,
    storage: Arc<dyn Storage>,
    api: Arc<ApiClient>,
    sessions: SessionManager,
    resolver: CharacterResolver,
    transport: ChatTransport,
    state: Mutex<ClientState>,
}

impl App {
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> anyhow::Result<Self> {
        let api = Arc::new(ApiClient::new(
            config.backend.base_url.clone(),
            config.backend.timeout(),
            Arc::clone(&storage),
        )?);

        Ok(Self {
            sessions: SessionManager::new(Arc::clone(&api), Arc::clone(&storage)),
            resolver: CharacterResolver::new(
                Arc::clone(&api),
                Arc::clone(&storage),
                config.backend.my_characters_paths.clone(),
            ),
            transport: ChatTransport::new(Arc::clone(&api), config.backend.send_path.clone()),
            state: Mutex::new(ClientState::new(config.quota.threshold)),
            config,
            storage,
            api,
        })
    }

    pub fn survey_url(&self) -> &str {
        &self.config.survey.url
    }

    pub async fn snapshot(&self) -> ClientState {
        self.state.lock().await.clone()
    }

    pub async fn view(&self) -> Resolution {
        self.state.lock().await.view()
    }

    /// Resolve `location` and make the result the current location
    pub async fn navigate(&self, location: &str) -> Resolution {
        let mut state = self.state.lock().await;
        let resolution = state.resolve(location);
        if resolution.redirected {
            debug!(from = %location, to = %resolution.path, "Redirected");
        }
        state.apply(Action::Navigated(resolution.path.clone()));
        resolution
    }

    /// Restore the session for a stored token, then open `location`
    pub async fn bootstrap(&self, location: &str) -> Resolution {
        if self.sessions.has_token() {
            match self.sessions.me().await {
                Ok(user) => {
                    if let Err(e) = self.start_session(user).await {
                        warn!(error = %e, "Failed to restore session");
                    }
                }
                Err(e) if e.is_auth() => {
                    info!("Stored token rejected, starting anonymous");
                    self.sessions.logout();
                }
                Err(e) => {
                    warn!(error = %e, "Could not reach backend to restore session");
                }
            }
        }
        self.navigate(location).await
    }

    /// Logging in while another user is logged in ends that session first
    pub async fn login(&self, email: &str, password: &str) -> Result<Resolution, ClientError> {
        if self.state.lock().await.session.is_authenticated() {
            info!("Ending current session before switching users");
            self.sessions.logout();
            self.state.lock().await.apply(Action::SessionEnded);
        }

        let session = self.sessions.login(email, password).await?;
        let user = session
            .user
            .clone()
            .ok_or_else(|| ClientError::Auth("Login returned no user".to_string()))?;
        self.start_session(user).await?;
        Ok(self.navigate("/chat").await)
    }

    /// Create the account, then log straight in with the same credentials
    pub async fn register(&self, email: &str, password: &str) -> Result<Resolution, ClientError> {
        let registration = self.sessions.register(email, password).await?;
        info!(
            assigned = registration.assigned_characters.map(|c| c.len()).unwrap_or(0),
            "Account created, logging in"
        );
        self.login(email, password).await
    }

    pub async fn logout(&self) -> Resolution {
        self.sessions.logout();
        self.state.lock().await.apply(Action::SessionEnded);
        self.navigate("/").await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String, ClientError> {
        self.sessions.forgot_password(email).await
    }

    /// Reset with the token carried by the current reset-password location
    pub async fn reset_password(&self, new_password: &str, confirm_password: &str) -> Result<String, ClientError> {
        let token = match self.view().await.view {
            View::ResetPassword { token } => token.unwrap_or_default(),
            _ => String::new(),
        };
        let message = self
            .sessions
            .reset_password(&token, new_password, confirm_password)
            .await?;
        self.navigate("/login").await;
        Ok(message)
    }

    /// Resolve the assigned characters and load the selected transcript
    pub async fn refresh_characters(&self) -> Result<Vec<Character>, ClientError> {
        let user = self
            .state
            .lock()
            .await
            .session
            .user
            .clone()
            .ok_or_else(|| ClientError::Auth("Not logged in".to_string()))?;

        let resolved = self.resolver.resolve(&user).await;
        let resolved = self.guard(resolved).await?;

        let mut counts = self.sessions.cached_counts();
        counts.extend(resolved.counts);
        let stored_selection: Option<CharacterId> = self.storage.get_json(keys::SELECTED_CHARACTER);

        let selected = {
            let mut state = self.state.lock().await;
            let had_selection = state.selected.is_some();
            state.apply(Action::CharactersResolved {
                characters: resolved.characters.clone(),
                counts,
            });
            if let (false, Some(id)) = (had_selection, stored_selection) {
                state.apply(Action::CharacterSelected(id));
            }
            state.selected
        };

        if let Some(id) = selected {
            self.persist_selection(id);
            match self.load_history().await {
                Ok(()) => {}
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => warn!(character_id = id, error = %e, "Failed to load history"),
            }
        }
        self.persist_counts().await;

        Ok(resolved.characters)
    }

    pub async fn select_character(&self, character_id: CharacterId) -> Result<(), ClientError> {
        {
            let mut state = self.state.lock().await;
            if !state.characters.iter().any(|c| c.id == character_id) {
                return Err(ClientError::UnknownCharacter(character_id));
            }
            state.apply(Action::CharacterSelected(character_id));
        }
        self.persist_selection(character_id);
        self.load_history().await
    }

    /// Fetch the selected character's history. Dropped if the user switched
    /// away before it arrived.
    pub async fn load_history(&self) -> Result<(), ClientError> {
        let (character_id, epoch) = {
            let state = self.state.lock().await;
            let character_id = state.selected.ok_or(ClientError::NoCharacterSelected)?;
            (character_id, state.transcript.epoch())
        };

        let response = self.api.chat_history(character_id).await;
        let history = self.guard(response).await?.into_history(character_id);

        self.state.lock().await.apply(Action::HistoryLoaded {
            character_id,
            epoch,
            messages: history.messages,
            counts: history.counts,
        });
        Ok(())
    }

    /// Send `text` to the selected character
    pub async fn send(&self, text: &str) -> Result<Message, ClientError> {
        let character_id = self
            .state
            .lock()
            .await
            .selected
            .ok_or(ClientError::NoCharacterSelected)?;

        let result = self.transport.send(&self.state, character_id, text).await;
        let reply = self.guard(result).await?;

        self.persist_counts().await;

        let complete = {
            let state = self.state.lock().await;
            state.survey_unlocked() && !state.quota.survey_unlocked()
        };
        if complete {
            info!("All characters complete");
            if let Err(e) = self.check_survey_status().await {
                warn!(error = %e, "Survey status check failed");
            }
            let location = self.state.lock().await.location.clone();
            self.navigate(&location).await;
        }

        Ok(reply)
    }

    /// Ask the backend whether the survey is open; latches when it is
    pub async fn check_survey_status(&self) -> Result<bool, ClientError> {
        let status = self.api.survey_status().await;
        let show = self.guard(status).await?.show_survey;
        if show {
            self.state.lock().await.apply(Action::SurveyUnlocked);
        }
        Ok(show)
    }

    pub async fn admin_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        self.require_admin().await?;
        let result = self.api.admin_conversations().await.map_err(forbidden);
        Ok(self.guard(result).await?.into_summaries())
    }

    pub async fn admin_conversation_messages(&self, conversation_id: u32) -> Result<Vec<Message>, ClientError> {
        self.require_admin().await?;
        let result = self
            .api
            .admin_conversation_messages(conversation_id)
            .await
            .map_err(forbidden);
        Ok(self.guard(result).await?.into_messages())
    }

    pub async fn set_admin_role(&self, user_id: u32, is_admin: bool) -> Result<String, ClientError> {
        self.require_admin().await?;
        let result = self.api.set_admin_role(user_id, is_admin).await.map_err(forbidden);
        let ack = self.guard(result).await?;
        info!(user_id = user_id, is_admin = is_admin, "Role updated");
        Ok(ack.message.unwrap_or_else(|| "Role updated".to_string()))
    }

    async fn start_session(&self, user: User) -> Result<(), ClientError> {
        let session = Session {
            user: Some(user),
            token: self.sessions.token(),
        };
        self.state.lock().await.apply(Action::SessionStarted(session));

        match self.refresh_characters().await {
            Ok(_) => {}
            Err(ClientError::NoCharactersAssigned) => {
                warn!("Logged in without assigned characters");
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = self.check_survey_status().await {
            if e.is_auth() {
                return Err(e);
            }
            debug!(error = %e, "Survey status unavailable");
        }
        Ok(())
    }

    async fn require_admin(&self) -> Result<(), ClientError> {
        if self.state.lock().await.session.is_admin() {
            Ok(())
        } else {
            Err(ClientError::Forbidden)
        }
    }

    /// Apply the auth-failure policy to `result`
    async fn guard<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result {
            if e.is_auth() {
                self.expire_session().await;
            }
        }
        result
    }

    async fn expire_session(&self) {
        warn!("Session rejected by backend, returning to login");
        self.sessions.logout();
        self.state.lock().await.apply(Action::SessionEnded);
        tokio::time::sleep(self.config.session.auth_redirect_delay()).await;
        self.navigate("/login").await;
    }

    async fn persist_counts(&self) {
        let counts = self.state.lock().await.quota.counts().clone();
        if counts.is_empty() {
            return;
        }
        if let Err(e) = self.storage.set_json(keys::MESSAGE_COUNTS, &counts) {
            warn!(error = %e, "Failed to persist message counts");
        }
    }

    fn persist_selection(&self, character_id: CharacterId) {
        if let Err(e) = self.storage.set_json(keys::SELECTED_CHARACTER, &character_id) {
            warn!(error = %e, "Failed to persist selected character");
        }
    }
}

fn forbidden(e: ClientError) -> ClientError {
    match e {
        ClientError::Http { status: 403, .. } => ClientError::Forbidden,
        e => e,
    }
}
