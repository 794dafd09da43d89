use std::{fmt, time::Duration};

use askama::Template;
use async_trait::async_trait;
use lettre::{
    address::AddressError,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use contact_relay_core::{NotifyError, Submission, SubmissionNotifier};

use crate::templates::{NotificationHtml, NotificationText};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the connection to the SMTP relay is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (usually port 465).
    Implicit,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
    /// No encryption. Only meant for local mail catchers.
    None,
}

/// Connection and addressing parameters for [`SmtpNotifier`].
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub recipient: String,
    pub subject_prefix: String,
    pub timeout: Duration,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("recipient", &self.recipient)
            .field("subject_prefix", &self.subject_prefix)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sends one email per accepted submission to the site owner.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipient: Mailbox,
    subject_prefix: String,
    relay: String,
}

impl SmtpNotifier {
    /// Builds the transport and checks the sender and recipient addresses up front.
    ///
    /// Must be called from inside a Tokio runtime: the pooled transport spawns
    /// its connection reaper when it is built.
    pub fn new(settings: SmtpSettings) -> Result<Self, MailerError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|source| MailerError::InvalidAddress {
                field: "from",
                source,
            })?;
        let recipient: Mailbox =
            settings
                .recipient
                .parse()
                .map_err(|source| MailerError::InvalidAddress {
                    field: "recipient",
                    source,
                })?;

        let builder = match settings.tls {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
            TlsMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            }
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
        };
        let mut builder = builder
            .port(settings.port)
            .timeout(Some(settings.timeout));
        if let (Some(user), Some(pass)) = (settings.username, settings.password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            recipient,
            subject_prefix: settings.subject_prefix,
            relay: format!("{}:{}", settings.host, settings.port),
        })
    }

    /// Renders the notification for a submission without sending it.
    pub fn build_message(&self, submission: &Submission) -> Result<Message, NotifyError> {
        let contact = submission.contact.form();
        let name = contact.name.trim();
        let email = contact.email.trim();
        let subject = single_line(&contact.subject);
        let message = contact.message.trim();

        let reply_address: Address = email
            .parse()
            .map_err(|err| NotifyError::Message(format!("reply-to address: {err}")))?;
        let reply_to = Mailbox::new(Some(name.to_string()), reply_address);

        let subject_line = if subject.is_empty() {
            self.subject_prefix.clone()
        } else {
            format!("{}: {}", self.subject_prefix, subject)
        };

        let text = NotificationText {
            name,
            email,
            subject: &subject,
            message,
        }
        .render()
        .map_err(|err| NotifyError::Message(format!("text body: {err}")))?;
        let html = NotificationHtml {
            name,
            email,
            subject: &subject,
            message,
        }
        .render()
        .map_err(|err| NotifyError::Message(format!("html body: {err}")))?;

        Message::builder()
            .from(self.from.clone())
            .reply_to(reply_to)
            .to(self.recipient.clone())
            .subject(subject_line)
            .multipart(MultiPart::alternative_plain_html(text, html))
            .map_err(|err| NotifyError::Message(err.to_string()))
    }
}

#[async_trait]
impl SubmissionNotifier for SmtpNotifier {
    async fn notify(&self, submission: &Submission) -> Result<(), NotifyError> {
        let message = self.build_message(submission)?;
        self.transport
            .send(message)
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        info!(
            stage = "notify",
            submission_id = %submission.id,
            relay = %self.relay,
            "notification email accepted by relay"
        );
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid {field} address: {source}")]
    InvalidAddress {
        field: &'static str,
        source: AddressError,
    },
    #[error("failed to configure smtp transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
