pub mod ports;
pub mod types;
pub mod validator;

pub use ports::{NotifyError, StoreError, SubmissionNotifier, SubmissionStore};
pub use types::{ContactForm, Submission, ValidatedContact};
pub use validator::{validate, ValidationError};
