use async_trait::async_trait;
use tracing::info;

use contact_relay_core::{NotifyError, Submission, SubmissionNotifier};

/// Stand-in used when no SMTP relay is configured.
///
/// Records that a notification would have been sent. Message content is not
/// logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl SubmissionNotifier for LogNotifier {
    async fn notify(&self, submission: &Submission) -> Result<(), NotifyError> {
        info!(
            stage = "notify",
            submission_id = %submission.id,
            received_at = %submission.received_at.to_rfc3339(),
            "smtp disabled, notification skipped"
        );
        Ok(())
    }
}
