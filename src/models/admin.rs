use chrono::{DateTime, Utc};

/// Row of the admin conversation table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: u32,
    pub user_email: Option<String>,
    pub character_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    pub fn user_label(&self) -> &str {
        self.user_email.as_deref().unwrap_or("N/A")
    }

    pub fn character_label(&self) -> &str {
        self.character_name.as_deref().unwrap_or("N/A")
    }
}
