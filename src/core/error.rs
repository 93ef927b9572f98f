// Centralized error handling for the chat client

use thiserror::Error;

/// Client-side form rule violations. These never reach the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Email address is required")]
    EmptyEmail,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password is required")]
    EmptyPassword,

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("Password must be at most {max} characters long")]
    PasswordTooLong { max: usize },

    #[error("Password must not contain your email address")]
    PasswordContainsEmail,

    #[error("Password must contain at least one number or symbol")]
    PasswordMissingDigitOrSymbol,

    #[error("Password must contain at least one uppercase letter")]
    PasswordMissingUppercase,

    #[error("Password must contain at least one number")]
    PasswordMissingDigit,

    #[error("Password must contain at least one special character")]
    PasswordMissingSpecial,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Reset token is missing")]
    MissingResetToken,

    #[error("Message must not be empty")]
    EmptyMessage,
}

/// Errors surfaced by every client operation.
///
/// Nothing here is fatal: each variant leaves the store in its last valid state.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authenticated: {0}")]
    Auth(String),

    #[error("Admin access required")]
    Forbidden,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No characters assigned. Please try again or contact support.")]
    NoCharactersAssigned,

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("A message is already being sent")]
    SendInProgress,

    #[error("Message limit reached for character {character_id} ({threshold} messages)")]
    LimitReached { character_id: u32, threshold: u32 },

    #[error("No character selected")]
    NoCharacterSelected,

    #[error("Unknown character: {0}")]
    UnknownCharacter(u32),

    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Local storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ClientError {
    /// Authentication failures send the user back to the login screen.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }

    /// True for 4xx responses the backend uses to reject credentials.
    pub fn is_client_rejection(&self) -> bool {
        match self {
            ClientError::Auth(_) => true,
            ClientError::Http { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Converts a rejected credential submission into an auth failure.
    pub fn into_auth(self) -> ClientError {
        if !self.is_client_rejection() {
            return self;
        }
        match self {
            ClientError::Http { status, body } => {
                ClientError::Auth(if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body
                })
            }
            other => other,
        }
    }

    /// Wraps a transport-level failure of a chat send. Auth failures keep
    /// their identity so the redirect policy still applies.
    pub fn into_send_failure(self) -> ClientError {
        match self {
            e @ (ClientError::Auth(_) | ClientError::SendFailed(_)) => e,
            other => ClientError::SendFailed(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
