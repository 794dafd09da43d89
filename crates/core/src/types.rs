use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contact form payload as received from the boundary.
///
/// Values are carried exactly as submitted; nothing downstream rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// A contact form that passed [`crate::validator::validate`].
///
/// The only constructor lives in the validator, so holding one of these is
/// proof that every field rule has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedContact {
    form: ContactForm,
}

impl ValidatedContact {
    pub(crate) fn new(form: ContactForm) -> Self {
        Self { form }
    }

    pub fn form(&self) -> &ContactForm {
        &self.form
    }

    pub fn into_inner(self) -> ContactForm {
        self.form
    }
}

impl Deref for ValidatedContact {
    type Target = ContactForm;

    fn deref(&self) -> &Self::Target {
        &self.form
    }
}

/// One accepted contact form flowing through persistence and notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: String,
    pub contact: ValidatedContact,
    pub received_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(id: impl Into<String>, contact: ValidatedContact, received_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            contact,
            received_at,
        }
    }
}
