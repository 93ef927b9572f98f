// Client state (ClientState) and its transitions

use crate::core::error::ClientError;
use crate::models::character::{Character, CharacterId};
use crate::models::message::Message;
use crate::router::routes::{self, AuthState, Resolution};
use crate::session::manager::Session;
use crate::session::resolver::pick_selection;
use crate::stores::quota::QuotaTracker;
use crate::stores::transcript::{SendTicket, Transcript};
use std::collections::HashMap;
use tracing::debug;

/// Everything the views render from.
///
/// All mutation goes through [`ClientState::apply`] and
/// [`ClientState::begin_send`]; async work happens outside and reports back
/// as an [`Action`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientState {
    pub session: Session,

    /// Assigned characters, in backend order
    pub characters: Vec<Character>,

    pub selected: Option<CharacterId>,

    /// Messages of the selected character only
    pub transcript: Transcript,

    pub quota: QuotaTracker,

    /// Current location, path plus optional query
    pub location: String,

    /// The send currently awaiting the backend
    pub pending: Option<SendTicket>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    SessionStarted(Session),
    SessionEnded,
    CharactersResolved {
        characters: Vec<Character>,
        counts: HashMap<CharacterId, u32>,
    },
    CharacterSelected(CharacterId),
    HistoryLoaded {
        character_id: CharacterId,
        epoch: u64,
        messages: Vec<Message>,
        counts: HashMap<CharacterId, u32>,
    },
    CountsReported(HashMap<CharacterId, u32>),
    SendSucceeded {
        ticket: SendTicket,
        reply: Message,
        count: Option<u32>,
        counts: HashMap<CharacterId, u32>,
    },
    SendFailed {
        ticket: SendTicket,
    },
    SurveyUnlocked,
    Navigated(String),
}

impl ClientState {
    pub fn new(threshold: u32) -> Self {
        Self {
            session: Session::anonymous(),
            characters: Vec::new(),
            selected: None,
            transcript: Transcript::new(),
            quota: QuotaTracker::new(threshold),
            location: "/".to_string(),
            pending: None,
        }
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SessionStarted(session) => {
                let user_id = |s: &Session| s.user.as_ref().map(|u| u.id);
                if self.session.is_authenticated() && user_id(&self.session) != user_id(&session) {
                    self.apply(Action::SessionEnded);
                }
                self.session = session;
            }
            Action::SessionEnded => {
                let location = std::mem::take(&mut self.location);
                *self = Self::new(self.quota.threshold());
                self.location = location;
            }
            Action::CharactersResolved { characters, counts } => {
                self.quota.resync_all(counts);
                let selection = pick_selection(&characters, self.selected);
                self.characters = characters;
                self.switch_to(selection);
            }
            Action::CharacterSelected(character_id) => {
                if self.characters.iter().any(|c| c.id == character_id) {
                    self.switch_to(Some(character_id));
                } else {
                    debug!(character_id = character_id, "Ignoring selection of unassigned character");
                }
            }
            Action::HistoryLoaded {
                character_id,
                epoch,
                messages,
                counts,
            } => {
                self.quota.resync_all(counts);
                if !self.transcript.load(character_id, epoch, messages) {
                    debug!(character_id = character_id, epoch = epoch, "Dropping stale history");
                }
            }
            Action::CountsReported(counts) => {
                self.quota.resync_all(counts);
            }
            Action::SendSucceeded {
                ticket,
                reply,
                count,
                counts,
            } => {
                self.clear_pending(&ticket);
                let server_count = count.or_else(|| counts.get(&ticket.character_id).copied());
                self.quota.resync_all(counts);
                self.quota.record(ticket.character_id, server_count);
                if !self.transcript.confirm(&ticket, reply) {
                    debug!(character_id = ticket.character_id, "Reply arrived after switching characters");
                }
            }
            Action::SendFailed { ticket } => {
                self.clear_pending(&ticket);
                self.transcript.rollback(&ticket);
            }
            Action::SurveyUnlocked => {
                self.quota.unlock_survey();
            }
            Action::Navigated(location) => {
                self.location = location;
            }
        }
    }

    /// Check that `character_id` may receive a message and append it optimistically
    pub fn begin_send(&mut self, character_id: CharacterId, text: &str) -> Result<SendTicket, ClientError> {
        if !self.characters.iter().any(|c| c.id == character_id) {
            return Err(ClientError::UnknownCharacter(character_id));
        }
        if self.selected != Some(character_id) {
            return Err(ClientError::NoCharacterSelected);
        }
        if self.pending.is_some() {
            return Err(ClientError::SendInProgress);
        }
        if self.quota.has_reached_limit(character_id) {
            return Err(ClientError::LimitReached {
                character_id,
                threshold: self.quota.threshold(),
            });
        }

        let ticket = self
            .transcript
            .push_optimistic(Message::user(text))
            .ok_or(ClientError::NoCharacterSelected)?;
        self.pending = Some(ticket);
        Ok(ticket)
    }

    pub fn assigned_ids(&self) -> Vec<CharacterId> {
        self.characters.iter().map(|c| c.id).collect()
    }

    pub fn selected_character(&self) -> Option<&Character> {
        let id = self.selected?;
        self.characters.iter().find(|c| c.id == id)
    }

    /// Every assigned character reached the threshold, or the backend said so
    pub fn survey_unlocked(&self) -> bool {
        self.quota.all_complete(&self.assigned_ids())
    }

    pub fn can_send(&self) -> bool {
        match self.selected {
            Some(id) => self.pending.is_none() && self.quota.can_send(id),
            None => false,
        }
    }

    pub fn view(&self) -> Resolution {
        self.resolve(&self.location)
    }

    pub fn resolve(&self, location: &str) -> Resolution {
        routes::resolve(location, AuthState::from(&self.session), self.survey_unlocked())
    }

    fn switch_to(&mut self, selection: Option<CharacterId>) {
        match selection {
            Some(id) if self.selected == Some(id) && self.transcript.character_id() == Some(id) => {}
            Some(id) => {
                self.selected = Some(id);
                self.transcript.select(id);
            }
            None => {
                self.selected = None;
                self.transcript.clear();
            }
        }
    }

    fn clear_pending(&mut self, ticket: &SendTicket) {
        if self.pending.as_ref() == Some(ticket) {
            self.pending = None;
        }
    }
}
