// Plain-text rendering of each view

use persona_chat::core::error::ClientError;
use persona_chat::core::state::ClientState;
use persona_chat::models::admin::ConversationSummary;
use persona_chat::models::message::Message;
use persona_chat::router::routes::View;
use std::fmt::Write;

pub fn screen(state: &ClientState, view: &View, survey_url: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", view);

    match view {
        View::Start => {
            out.push_str("Chat with your assigned characters, then share your thoughts in a short survey.\n");
            out.push_str(":login <email> <password>   :signup <email> <password>\n");
        }
        View::Login => {
            out.push_str(":login <email> <password>   :go /forgot-password   :go /signup\n");
        }
        View::Signup => {
            out.push_str(":signup <email> <password>\n");
            out.push_str("8-128 characters, at least one number or symbol, must not contain your email.\n");
        }
        View::ForgotPassword => {
            out.push_str(":forgot <email>\n");
        }
        View::ResetPassword { token: Some(_) } => {
            out.push_str(":reset <new password> <confirm password>\n");
        }
        View::ResetPassword { token: None } => {
            out.push_str("This reset link is missing its token. Request a new one with :go /forgot-password\n");
        }
        View::Chat => chat(&mut out, state),
        View::Survey => {
            out.push_str("Thank you! You have completed every conversation.\n");
            let _ = writeln!(out, "Please fill in the survey: {}", survey_url);
        }
        View::Admin => {
            out.push_str(":go /admin/conversations/<id> to read one   :role <user id> admin|member\n");
        }
        View::AdminConversation { id } => {
            let _ = writeln!(out, "Conversation {}   :go /admin to go back", id);
        }
    }

    out
}

fn chat(out: &mut String, state: &ClientState) {
    if state.characters.is_empty() {
        out.push_str("No characters assigned. Retry with :chars or contact support.\n");
        return;
    }

    for character in &state.characters {
        let marker = if state.selected == Some(character.id) { '>' } else { ' ' };
        let done = if state.quota.has_reached_limit(character.id) { " (complete)" } else { "" };
        let _ = writeln!(
            out,
            "{} [{}] {} {}{}",
            marker,
            character.id,
            character.display_name(),
            state.quota.progress(character.id),
            done
        );
    }

    let Some(character) = state.selected_character() else {
        return;
    };

    if let Some(description) = character.display_description() {
        let _ = writeln!(out, "\n{}", description);
    }
    out.push('\n');
    out.push_str(&transcript(state.transcript.messages(), &character.display_name()));

    if state.quota.has_reached_limit(character.id) {
        let _ = writeln!(
            out,
            "You have sent {} messages to {}. Pick another character with :select <id>.",
            state.quota.threshold(),
            character.display_name()
        );
    } else if state.pending.is_some() {
        out.push_str("...\n");
    }
}

pub fn transcript(messages: &[Message], assistant: &str) -> String {
    let mut out = String::new();
    for message in messages {
        let speaker = if message.is_user() { "You" } else { assistant };
        let _ = writeln!(out, "{}: {}", speaker, message.content);
    }
    out
}

pub fn conversations(conversations: &[ConversationSummary]) -> String {
    if conversations.is_empty() {
        return "No conversations yet.\n".to_string();
    }
    let mut out = String::new();
    for conversation in conversations {
        let started = conversation
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            out,
            "#{:<5} {:<30} {:<16} {}",
            conversation.id,
            conversation.user_label(),
            conversation.character_label(),
            started
        );
    }
    out
}

/// One line shown next to the control that failed
pub fn error(e: &ClientError) -> String {
    match e {
        ClientError::Auth(_) => "Your session is no longer valid. Please log in again.".to_string(),
        ClientError::Network(_) => "Could not reach the server. Check your connection and try again.".to_string(),
        ClientError::SendFailed(_) => "Message could not be sent. Please try again.".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_chat::core::state::Action;
    use persona_chat::models::character::Character;
    use persona_chat::models::user::User;
    use persona_chat::session::manager::Session;
    use std::collections::HashMap;

    fn chat_state() -> ClientState {
        let mut state = ClientState::new(15);
        state.apply(Action::SessionStarted(Session {
            user: Some(User::new(1, "ana@example.com", false)),
            token: Some("token-1".to_string()),
        }));
        state.apply(Action::CharactersResolved {
            characters: vec![
                Character::new(1, "Maya").with_description("Calm. EI=8/10, CI=4/10"),
                Character::new(2, "Leo"),
            ],
            counts: HashMap::from([(1, 15), (2, 3)]),
        });
        state
    }

    #[test]
    fn test_chat_shows_progress_and_limit() {
        let state = chat_state();
        let text = screen(&state, &View::Chat, "https://survey");
        assert!(text.contains("> [1] Maya 15/15 (complete)"));
        assert!(text.contains("  [2] Leo 3/15"));
        assert!(text.contains("Pick another character"));
        assert!(!text.contains("EI="));
    }

    #[test]
    fn test_no_characters_offers_retry() {
        let mut state = ClientState::new(15);
        state.apply(Action::SessionStarted(Session {
            user: Some(User::new(1, "ana@example.com", false)),
            token: Some("token-1".to_string()),
        }));
        let text = screen(&state, &View::Chat, "https://survey");
        assert!(text.contains(":chars"));
    }

    #[test]
    fn test_survey_links_form() {
        let text = screen(&chat_state(), &View::Survey, "https://survey");
        assert!(text.contains("https://survey"));
    }

    #[test]
    fn test_send_failure_message() {
        let text = error(&ClientError::SendFailed("500".to_string()));
        assert_eq!(text, "Message could not be sent. Please try again.");
    }
}
