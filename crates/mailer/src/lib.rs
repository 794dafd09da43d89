pub mod log_only;
pub mod smtp;
mod templates;

pub use log_only::LogNotifier;
pub use smtp::{MailerError, SmtpNotifier, SmtpSettings, TlsMode, DEFAULT_TIMEOUT};
