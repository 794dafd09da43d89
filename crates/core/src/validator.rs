use email_address::{EmailAddress, Options};
use thiserror::Error;

use crate::types::{ContactForm, ValidatedContact};

pub const MAX_NAME_CHARS: usize = 200;
pub const MAX_EMAIL_CHARS: usize = 320;
pub const MAX_MESSAGE_CHARS: usize = 10_000;

/// Reasons a submission is refused before any side effect happens.
///
/// Every message is safe to hand back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The body could not be decoded into a [`ContactForm`] at all.
    #[error("request body must be a JSON object with string fields name, email, subject and message")]
    MalformedPayload,
    #[error("email is required")]
    EmptyEmail,
    #[error("email must contain a single address")]
    MultipleEmails,
    #[error("email is not a valid address: {0}")]
    InvalidEmail(String),
    #[error("name is required")]
    EmptyName,
    #[error("name must be at most {max} characters (got {len})")]
    NameTooLong { len: usize, max: usize },
    #[error("email must be at most {max} characters (got {len})")]
    EmailTooLong { len: usize, max: usize },
    #[error("message must be at most {max} characters (got {len})")]
    MessageTooLong { len: usize, max: usize },
}

impl ValidationError {
    /// `true` for decode failures, `false` for field rule failures.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::MalformedPayload)
    }

    /// Short machine-readable label used for problem types and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload => "malformed_payload",
            Self::EmptyEmail => "empty_email",
            Self::MultipleEmails => "multiple_emails",
            Self::InvalidEmail(_) => "invalid_email",
            Self::EmptyName => "empty_name",
            Self::NameTooLong { .. } => "name_too_long",
            Self::EmailTooLong { .. } => "email_too_long",
            Self::MessageTooLong { .. } => "message_too_long",
        }
    }
}

/// Checks the form rules in order and stops at the first failure.
pub fn validate(form: ContactForm) -> Result<ValidatedContact, ValidationError> {
    check_email_address(&form.email)?;

    if form.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    ensure_max_chars(&form.name, MAX_NAME_CHARS, |len, max| {
        ValidationError::NameTooLong { len, max }
    })?;
    ensure_max_chars(&form.email, MAX_EMAIL_CHARS, |len, max| {
        ValidationError::EmailTooLong { len, max }
    })?;
    ensure_max_chars(&form.message, MAX_MESSAGE_CHARS, |len, max| {
        ValidationError::MessageTooLong { len, max }
    })?;

    Ok(ValidatedContact::new(form))
}

impl TryFrom<ContactForm> for ValidatedContact {
    type Error = ValidationError;

    fn try_from(form: ContactForm) -> Result<Self, Self::Error> {
        validate(form)
    }
}

fn check_email_address(raw: &str) -> Result<(), ValidationError> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return Err(ValidationError::EmptyEmail);
    }

    // "a@x.org, b@y.org" style lists; a lone comma inside a quoted local part is left to the parser.
    let addresses = candidate
        .split([',', ';'])
        .filter(|part| part.contains('@'))
        .count();
    if addresses > 1 {
        return Err(ValidationError::MultipleEmails);
    }

    // Bare addresses only: "Name <addr>" would not survive as a Reply-To mailbox.
    EmailAddress::parse_with_options(candidate, Options::default().without_display_text())
        .map(|_| ())
        .map_err(|err| ValidationError::InvalidEmail(err.to_string()))
}

fn ensure_max_chars(
    value: &str,
    max: usize,
    on_violation: impl FnOnce(usize, usize) -> ValidationError,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(on_violation(len, max));
    }
    Ok(())
}
