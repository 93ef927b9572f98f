use crate::utils::text::strip_ratings;
use serde::{Deserialize, Serialize};

pub type CharacterId = u32;

/// A persona defined by the backend. Read-only on the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Backend character ID
    pub id: CharacterId,
    /// Display name
    pub name: String,
    /// Free-text persona description, may embed EI/CI ratings
    #[serde(default)]
    pub description: Option<String>,
    /// Emotional intelligence rating (0-10)
    #[serde(default, alias = "eiLevel")]
    pub ei_level: Option<u8>,
    /// Cognitive intelligence rating (0-10)
    #[serde(default, alias = "ciLevel")]
    pub ci_level: Option<u8>,
}

impl Character {
    pub fn new(id: CharacterId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            ei_level: None,
            ci_level: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name shown in pickers, falling back to the ID when the backend sent none
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Character {}", self.id)
        } else {
            self.name.clone()
        }
    }

    /// Description with the hidden EI/CI ratings removed
    pub fn display_description(&self) -> Option<String> {
        self.description.as_deref().map(strip_ratings)
    }
}
