use crate::models::character::CharacterId;
use crate::models::message::Message;

/// Identifies one in-flight send and the transcript it belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendTicket {
    pub character_id: CharacterId,
    /// Selection epoch at the time the send started
    pub epoch: u64,
    /// Transcript length before the optimistic message was pushed
    pub rollback_len: usize,
}

/// The visible transcript. It always belongs to exactly one character.
///
/// Each selection bumps `epoch`; results carrying an older epoch are stale
/// and never touch the messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    character_id: Option<CharacterId>,
    epoch: u64,
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to `character_id`, dropping the previous character's messages
    pub fn select(&mut self, character_id: CharacterId) -> u64 {
        self.character_id = Some(character_id);
        self.epoch += 1;
        self.messages.clear();
        self.epoch
    }

    pub fn clear(&mut self) {
        self.character_id = None;
        self.epoch += 1;
        self.messages.clear();
    }

    pub fn character_id(&self) -> Option<CharacterId> {
        self.character_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_current(&self, character_id: CharacterId, epoch: u64) -> bool {
        self.character_id == Some(character_id) && self.epoch == epoch
    }

    /// Replace the messages with loaded history, if still current
    pub fn load(&mut self, character_id: CharacterId, epoch: u64, messages: Vec<Message>) -> bool {
        if !self.is_current(character_id, epoch) {
            return false;
        }
        self.messages = messages;
        true
    }

    /// Append the user's message before the backend confirmed it
    pub fn push_optimistic(&mut self, message: Message) -> Option<SendTicket> {
        let character_id = self.character_id?;
        let ticket = SendTicket {
            character_id,
            epoch: self.epoch,
            rollback_len: self.messages.len(),
        };
        self.messages.push(message);
        Some(ticket)
    }

    /// Append the assistant reply for `ticket`, if still current
    pub fn confirm(&mut self, ticket: &SendTicket, reply: Message) -> bool {
        if !self.is_current(ticket.character_id, ticket.epoch) {
            return false;
        }
        self.messages.push(reply);
        true
    }

    /// Remove the optimistic message for `ticket`, if still current
    pub fn rollback(&mut self, ticket: &SendTicket) -> bool {
        if !self.is_current(ticket.character_id, ticket.epoch) {
            return false;
        }
        self.messages.truncate(ticket.rollback_len);
        true
    }
}
