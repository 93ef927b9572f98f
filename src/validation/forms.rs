use crate::core::error::ValidationError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Characters the reset form counts as "special"
const SPECIAL_CHARS: &str = r#"!@#$%^&*()_+-=[]{};':"\|,.<>/?"#;

/// Credentials as typed into the login or signup form
#[derive(Debug, Clone)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

/// Credentials that passed client-side checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCredentials {
    pub email: String,
    pub password: String,
}

/// New password as typed into the reset form
#[derive(Debug, Clone)]
pub struct ResetForm {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedReset {
    pub token: String,
    pub new_password: String,
}

impl CredentialsForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Login only needs both fields present; the backend judges the rest
    pub fn validate_login(self) -> Result<ValidatedCredentials, ValidationError> {
        let email = validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(ValidatedCredentials {
            email,
            password: self.password,
        })
    }

    /// Signup password policy: length, no embedded email, a digit or symbol
    pub fn validate_signup(self) -> Result<ValidatedCredentials, ValidationError> {
        let email = validate_email(&self.email)?;
        let password = self.password;

        validate_length(&password)?;

        if embeds_email(&password, &email) {
            return Err(ValidationError::PasswordContainsEmail);
        }

        if !password
            .chars()
            .any(|c| c.is_ascii_digit() || (!c.is_alphanumeric() && !c.is_whitespace()))
        {
            return Err(ValidationError::PasswordMissingDigitOrSymbol);
        }

        Ok(ValidatedCredentials { email, password })
    }
}

impl ResetForm {
    pub fn new(
        token: impl Into<String>,
        new_password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            new_password: new_password.into(),
            confirm_password: confirm_password.into(),
        }
    }

    /// Reset policy is stricter than signup: uppercase, digit and special
    pub fn validate(self) -> Result<ValidatedReset, ValidationError> {
        let token = self.token.trim().to_string();
        if token.is_empty() {
            return Err(ValidationError::MissingResetToken);
        }

        let password = self.new_password;
        validate_length(&password)?;

        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::PasswordMissingUppercase);
        }

        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::PasswordMissingDigit);
        }

        if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
            return Err(ValidationError::PasswordMissingSpecial);
        }

        if password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }

        Ok(ValidatedReset {
            token,
            new_password: password,
        })
    }
}

pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::EmptyEmail);
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email.to_string())
        }
        _ => Err(ValidationError::InvalidEmail(email.to_string())),
    }
}

/// Trimmed chat text, rejected when nothing is left
pub fn validate_message(text: &str) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(text.to_string())
}

fn validate_length(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }

    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }

    if len > MAX_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooLong {
            max: MAX_PASSWORD_LEN,
        });
    }

    Ok(())
}

/// The whole address, or a local part of 3+ characters, found in the password
fn embeds_email(password: &str, email: &str) -> bool {
    let password = password.to_lowercase();
    let email = email.to_lowercase();

    if password.contains(&email) {
        return true;
    }

    match email.split_once('@') {
        Some((local, _)) if local.chars().count() >= 3 => password.contains(local),
        _ => false,
    }
}
