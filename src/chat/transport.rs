use crate::api::client::ApiClient;
use crate::core::error::ClientError;
use crate::core::state::{Action, ClientState};
use crate::models::character::CharacterId;
use crate::models::message::Message;
use crate::validation::forms::validate_message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Backend answer to one user message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub reply: Message,
    /// Server count for the character the message went to
    pub count: Option<u32>,
    /// Server counts for any characters the backend chose to report
    pub counts: HashMap<CharacterId, u32>,
}

/// Sends user messages and applies the outcome to the store.
///
/// One attempt per call; a failed send has to be resubmitted by the user.
pub struct ChatTransport {
    api: Arc<ApiClient>,
    send_path: String,
}

impl ChatTransport {
    pub fn new(api: Arc<ApiClient>, send_path: impl Into<String>) -> Self {
        Self {
            api,
            send_path: send_path.into(),
        }
    }

    /// Optimistically append `text`, deliver it, then confirm or roll back.
    ///
    /// The store lock is never held across the network call, so the user can
    /// switch characters while a send is in flight. A reply for a character
    /// that is no longer on screen only updates counts.
    pub async fn send(
        &self,
        store: &Mutex<ClientState>,
        character_id: CharacterId,
        text: &str,
    ) -> Result<Message, ClientError> {
        let text = validate_message(text)?;

        let ticket = store.lock().await.begin_send(character_id, &text)?;

        match self.deliver(character_id, &text).await {
            Ok(delivery) => {
                let reply = delivery.reply.clone();
                let mut state = store.lock().await;
                state.apply(Action::SendSucceeded {
                    ticket,
                    reply: delivery.reply,
                    count: delivery.count,
                    counts: delivery.counts,
                });
                info!(
                    character_id = character_id,
                    count = state.quota.current_count(character_id),
                    threshold = state.quota.threshold(),
                    "Message delivered"
                );
                Ok(reply)
            }
            Err(e) => {
                store.lock().await.apply(Action::SendFailed { ticket });
                warn!(character_id = character_id, error = %e, "Send failed, rolled back");
                Err(e)
            }
        }
    }

    /// One POST to the send endpoint, no store involvement
    pub async fn deliver(&self, character_id: CharacterId, text: &str) -> Result<Delivery, ClientError> {
        let response = self
            .api
            .send_message(&self.send_path, character_id, text)
            .await
            .map_err(ClientError::into_send_failure)?;

        let reply = response
            .reply
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ClientError::SendFailed("Backend returned no reply".to_string()))?;

        let counts = response.interaction_counts.unwrap_or_default();
        let count = response
            .interaction_count
            .or_else(|| counts.get(&character_id).copied());

        Ok(Delivery {
            reply: Message::assistant(reply),
            count,
            counts,
        })
    }
}
