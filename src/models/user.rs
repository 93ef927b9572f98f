use crate::models::character::{Character, CharacterId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend user ID
    pub id: u32,
    /// Login email
    pub email: String,
    /// Whether the user may open the admin views
    #[serde(default)]
    pub is_admin: bool,
    /// IDs of the characters assigned to this user
    #[serde(default)]
    pub character_ids: Vec<CharacterId>,
    /// Full character objects, when the session payload embeds them
    #[serde(default)]
    pub characters: Vec<Character>,
}

impl User {
    pub fn new(id: u32, email: impl Into<String>, is_admin: bool) -> Self {
        Self {
            id,
            email: email.into(),
            is_admin,
            character_ids: Vec::new(),
            characters: Vec::new(),
        }
    }
}
