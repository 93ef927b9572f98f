// Wire shapes of the backend REST API.
//
// The backend has answered with several shapes over time; every type here
// accepts each known variant and normalizes into the domain models.

use crate::models::admin::ConversationSummary;
use crate::models::character::{Character, CharacterId};
use crate::models::message::{Message, Role};
use crate::models::user::User;
use crate::utils::time::{parse_timestamp, sort_key};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct CredentialsRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub character_id: CharacterId,
    pub user_message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RoleRequest {
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user: Option<ApiUser>,
    #[serde(default)]
    pub characters: Option<Vec<ApiCharacter>>,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub id: u32,
    pub email: String,
    #[serde(default, alias = "isAdmin")]
    pub is_admin: bool,
    #[serde(default, alias = "characterIds")]
    pub character_ids: Option<Vec<CharacterId>>,
    #[serde(default)]
    pub characters: Option<Vec<ApiCharacter>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCharacter {
    pub id: CharacterId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "eiLevel")]
    pub ei_level: Option<u8>,
    #[serde(default, alias = "ciLevel")]
    pub ci_level: Option<u8>,
    #[serde(default)]
    pub message_count: Option<u32>,
    #[serde(default)]
    pub interaction_count: Option<u32>,
}

/// Character lists arrive bare or wrapped in `{ "characters": [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CharacterList {
    Bare(Vec<ApiCharacter>),
    Wrapped {
        #[serde(default)]
        characters: Vec<ApiCharacter>,
    },
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    #[serde(default, alias = "response", alias = "message")]
    pub reply: Option<String>,
    #[serde(default)]
    pub interaction_count: Option<u32>,
    #[serde(default)]
    pub interaction_counts: Option<HashMap<CharacterId, u32>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, alias = "timestamp")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub character_id: Option<CharacterId>,
    #[serde(default)]
    pub character: Option<CharacterRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterRef {
    pub id: CharacterId,
}

/// History arrives bare or as an object with `messages`/`chat` and
/// optional server counts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HistoryResponse {
    Bare(Vec<ApiMessage>),
    Wrapped(HistoryEnvelope),
}

#[derive(Debug, Deserialize)]
pub struct HistoryEnvelope {
    #[serde(default, alias = "chat")]
    pub messages: Vec<ApiMessage>,
    /// Keyed by the character ID as a JSON string; untagged enums cannot
    /// parse integer map keys
    #[serde(default)]
    pub interaction_counts: Option<HashMap<String, u32>>,
    #[serde(default)]
    pub characters: Option<Vec<ApiCharacter>>,
}

#[derive(Debug, Deserialize)]
pub struct SurveyStatus {
    #[serde(default, alias = "show_survey", rename = "showSurvey")]
    pub show_survey: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConversationList {
    Bare(Vec<ApiConversation>),
    Wrapped {
        #[serde(default)]
        conversations: Vec<ApiConversation>,
    },
}

#[derive(Debug, Deserialize)]
pub struct ApiConversation {
    pub id: u32,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user: Option<EmailRef>,
    #[serde(default)]
    pub character_name: Option<String>,
    #[serde(default)]
    pub character: Option<NameRef>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRef {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NameRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageList {
    Bare(Vec<ApiMessage>),
    Wrapped {
        #[serde(default)]
        messages: Vec<ApiMessage>,
    },
}

/// Acknowledgement body of the password and role endpoints
#[derive(Debug, Default, Deserialize)]
pub struct Ack {
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
}

/// Per-character counts carried by character payloads
pub fn counts_of(characters: &[ApiCharacter]) -> HashMap<CharacterId, u32> {
    characters
        .iter()
        .filter_map(|c| c.reported_count().map(|count| (c.id, count)))
        .collect()
}

impl ApiCharacter {
    pub fn reported_count(&self) -> Option<u32> {
        self.interaction_count.or(self.message_count)
    }
}

impl From<ApiCharacter> for Character {
    fn from(api: ApiCharacter) -> Self {
        Character {
            id: api.id,
            name: api.name,
            description: api.description,
            ei_level: api.ei_level,
            ci_level: api.ci_level,
        }
    }
}

impl From<ApiUser> for User {
    fn from(api: ApiUser) -> Self {
        User {
            id: api.id,
            email: api.email,
            is_admin: api.is_admin,
            character_ids: api.character_ids.unwrap_or_default(),
            characters: api
                .characters
                .unwrap_or_default()
                .into_iter()
                .map(Character::from)
                .collect(),
        }
    }
}

impl CharacterList {
    pub fn into_vec(self) -> Vec<ApiCharacter> {
        match self {
            CharacterList::Bare(characters) => characters,
            CharacterList::Wrapped { characters } => characters,
        }
    }
}

impl ApiMessage {
    fn belongs_to(&self, character_id: CharacterId) -> bool {
        match (self.character_id, &self.character) {
            (Some(id), _) => id == character_id,
            (None, Some(character)) => character.id == character_id,
            // untagged messages are assumed to belong to the requested thread
            (None, None) => true,
        }
    }
}

impl From<ApiMessage> for Message {
    fn from(api: ApiMessage) -> Self {
        Message {
            role: api.role,
            content: api.content,
            created_at: api.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

/// History normalized for one character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    pub messages: Vec<Message>,
    pub counts: HashMap<CharacterId, u32>,
}

impl HistoryResponse {
    /// Keep only `character_id`'s messages, oldest first
    pub fn into_history(self, character_id: CharacterId) -> History {
        let (messages, counts) = match self {
            HistoryResponse::Bare(messages) => (messages, HashMap::new()),
            HistoryResponse::Wrapped(envelope) => {
                let counts = match (envelope.interaction_counts, envelope.characters) {
                    (Some(counts), _) => counts
                        .into_iter()
                        .filter_map(|(id, count)| id.parse().ok().map(|id| (id, count)))
                        .collect(),
                    (None, Some(characters)) => counts_of(&characters),
                    (None, None) => HashMap::new(),
                };
                (envelope.messages, counts)
            }
        };

        let mut messages: Vec<Message> = messages
            .into_iter()
            .filter(|m| m.belongs_to(character_id))
            .map(Message::from)
            .collect();
        messages.sort_by_key(|m| sort_key(m.created_at));

        History { messages, counts }
    }
}

impl ConversationList {
    pub fn into_summaries(self) -> Vec<ConversationSummary> {
        let conversations = match self {
            ConversationList::Bare(conversations) => conversations,
            ConversationList::Wrapped { conversations } => conversations,
        };

        conversations
            .into_iter()
            .map(|c| ConversationSummary {
                id: c.id,
                user_email: c.user_email.or_else(|| c.user.and_then(|u| u.email)),
                character_name: c.character_name.or_else(|| c.character.and_then(|ch| ch.name)),
                created_at: c.created_at.as_deref().and_then(parse_timestamp),
            })
            .collect()
    }
}

impl MessageList {
    pub fn into_messages(self) -> Vec<Message> {
        let messages = match self {
            MessageList::Bare(messages) => messages,
            MessageList::Wrapped { messages } => messages,
        };
        messages.into_iter().map(Message::from).collect()
    }
}
