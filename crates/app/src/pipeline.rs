use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use contact_relay_core::{
    validate, ContactForm, StoreError, Submission, SubmissionNotifier, SubmissionStore,
    ValidationError,
};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Validates, persists, then hands a submission to the notifier in the background.
///
/// Storage is authoritative: once the row is written the submission counts as
/// accepted whatever happens to the notification.
#[derive(Clone)]
pub struct SubmissionPipeline {
    store: Arc<dyn SubmissionStore>,
    notifier: Arc<dyn SubmissionNotifier>,
    clock: Clock,
}

impl SubmissionPipeline {
    pub fn new(store: Arc<dyn SubmissionStore>, notifier: Arc<dyn SubmissionNotifier>) -> Self {
        Self {
            store,
            notifier,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs one submission through validation and storage.
    ///
    /// Returns as soon as the row is stored. The notification is spawned on
    /// its own task and its outcome only shows up in logs and metrics.
    pub async fn submit(&self, form: ContactForm) -> Result<(), SubmitError> {
        let contact = validate(form).map_err(|err| {
            counter!("contact_submissions_total", "result" => "rejected").increment(1);
            debug!(stage = "validation", reason = err.kind(), "contact form rejected");
            SubmitError::Validation(err)
        })?;

        let submission = Submission::new(Uuid::new_v4().to_string(), contact, (self.clock)());

        let started = Instant::now();
        let saved = self.store.save(&submission).await;
        histogram!("contact_persist_latency_seconds").record(started.elapsed().as_secs_f64());

        if let Err(err) = saved {
            counter!("contact_submissions_total", "result" => "storage_failed").increment(1);
            error!(
                stage = "storage",
                submission_id = %submission.id,
                kind = err.kind(),
                error = %err,
                "failed to persist contact submission"
            );
            return Err(SubmitError::Storage(err));
        }

        counter!("contact_submissions_total", "result" => "accepted").increment(1);
        info!(
            stage = "storage",
            submission_id = %submission.id,
            "contact submission persisted"
        );

        self.dispatch_notification(submission);
        Ok(())
    }

    /// Spawns the notification detached from the caller.
    ///
    /// The task owns the submission and a handle to the notifier, so dropping
    /// the request future does not cancel it.
    fn dispatch_notification(&self, submission: Submission) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = notifier.notify(&submission).await;
            histogram!("contact_notify_latency_seconds").record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(()) => {
                    counter!("contact_notifications_total", "result" => "sent").increment(1);
                    debug!(
                        stage = "notify",
                        submission_id = %submission.id,
                        "notification dispatched"
                    );
                }
                Err(err) => {
                    counter!("contact_notifications_total", "result" => "failed").increment(1);
                    error!(
                        stage = "notify",
                        submission_id = %submission.id,
                        kind = err.kind(),
                        error = %err,
                        "failed to send contact notification"
                    );
                }
            }
        });
    }
}

/// Caller-visible failures. Notification problems never appear here.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("submission could not be stored: {0}")]
    Storage(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tokio::time;

    use crate::telemetry;
    use crate::testing::{
        contact_form, BlockingNotifier, FailingNotifier, FailingStore, RecordingNotifier,
        RecordingStore,
    };

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn accepted_submission_is_stored_then_notified() {
        let store = RecordingStore::new();
        let (notifier, mut notified) = RecordingNotifier::new();
        let pipeline = SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier));

        pipeline
            .submit(contact_form("John", "john@example.com", "Hi"))
            .await
            .expect("submission accepted");

        let saved = store.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].contact.email, "john@example.com");
        assert_eq!(saved[0].contact.subject, "Hello");

        let sent = time::timeout(WAIT, notified.recv())
            .await
            .expect("notification within timeout")
            .expect("notifier channel open");
        assert_eq!(sent.id, saved[0].id);
    }

    #[tokio::test]
    async fn invalid_email_touches_no_port() {
        let store = RecordingStore::new();
        let (notifier, mut notified) = RecordingNotifier::new();
        let pipeline = SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier));

        let err = pipeline
            .submit(contact_form("John", "not-an-email", "Hi"))
            .await
            .expect_err("invalid email rejected");

        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::InvalidEmail(_))
        ));
        assert_eq!(store.calls(), 0);
        assert!(notified.try_recv().is_err());
    }

    #[tokio::test]
    async fn oversized_fields_are_rejected_before_storage() {
        let store = RecordingStore::new();
        let (notifier, _notified) = RecordingNotifier::new();
        let pipeline = SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier));

        let long_name = "n".repeat(201);
        let long_email = format!("{}john@example.com{}", " ".repeat(200), " ".repeat(200));
        let long_message = "m".repeat(10_001);

        for form in [
            contact_form(&long_name, "john@example.com", "Hi"),
            contact_form("John", &long_email, "Hi"),
            contact_form("John", "john@example.com", &long_message),
        ] {
            let err = pipeline.submit(form).await.expect_err("oversized field");
            assert!(matches!(err, SubmitError::Validation(_)));
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn message_boundary_is_inclusive() {
        let store = RecordingStore::new();
        let (notifier, _notified) = RecordingNotifier::new();
        let pipeline = SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier));

        pipeline
            .submit(contact_form("John", "john@example.com", &"m".repeat(10_000)))
            .await
            .expect("exactly 10,000 characters accepted");

        let err = pipeline
            .submit(contact_form("John", "john@example.com", &"m".repeat(10_001)))
            .await
            .expect_err("10,001 characters rejected");
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::MessageTooLong { .. })
        ));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn storage_failure_is_reported_and_skips_notification() {
        let store = FailingStore::unavailable("connection refused");
        let (notifier, mut notified) = RecordingNotifier::new();
        let pipeline = SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier));

        let err = pipeline
            .submit(contact_form("John", "john@example.com", "Hi"))
            .await
            .expect_err("storage failure surfaces");
        assert!(matches!(err, SubmitError::Storage(StoreError::Unavailable(_))));
        assert_eq!(store.calls(), 1);

        time::sleep(Duration::from_millis(50)).await;
        assert!(notified.try_recv().is_err());
    }

    #[tokio::test]
    async fn notification_failure_does_not_affect_result() {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let store = RecordingStore::new();
        let notifier = FailingNotifier::new();
        let pipeline =
            SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier.clone()));

        pipeline
            .submit(contact_form("John", "john@example.com", "Hi"))
            .await
            .expect("accepted despite notifier failure");

        assert_eq!(store.calls(), 1);
        time::timeout(WAIT, notifier.wait_for_attempt())
            .await
            .expect("notifier attempted");

        // The outcome is recorded just after the notifier returns.
        let failed = r#"contact_notifications_total{result="failed"}"#;
        time::timeout(WAIT, async {
            while !telemetry::render_metrics(&metrics).contains(failed) {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("failed notification counted");
    }

    #[tokio::test]
    async fn slow_notification_does_not_block_caller() {
        let store = RecordingStore::new();
        let notifier = BlockingNotifier::new();
        let pipeline =
            SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier.clone()));

        time::timeout(
            WAIT,
            pipeline.submit(contact_form("John", "john@example.com", "Hi")),
        )
        .await
        .expect("submit returns while notifier is still blocked")
        .expect("submission accepted");

        assert_eq!(store.calls(), 1);
        assert!(!notifier.finished());
        notifier.release();
        time::timeout(WAIT, notifier.wait_until_finished())
            .await
            .expect("notification completes after release");
    }

    #[tokio::test]
    async fn notification_outlives_a_cancelled_caller() {
        let store = RecordingStore::new();
        let notifier = BlockingNotifier::new();
        let pipeline =
            SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier.clone()));

        let request = tokio::spawn({
            let pipeline = pipeline.clone();
            async move {
                pipeline
                    .submit(contact_form("John", "john@example.com", "Hi"))
                    .await
            }
        });
        request
            .await
            .expect("request task")
            .expect("submission accepted");
        drop(pipeline);

        notifier.release();
        time::timeout(WAIT, notifier.wait_until_finished())
            .await
            .expect("detached notification still completes");
    }

    #[tokio::test]
    async fn identical_submissions_are_stored_twice() {
        let store = RecordingStore::new();
        let (notifier, _notified) = RecordingNotifier::new();
        let pipeline = SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier));

        for _ in 0..2 {
            pipeline
                .submit(contact_form("John", "john@example.com", "Hi"))
                .await
                .expect("accepted");
        }

        let saved = store.saved();
        assert_eq!(saved.len(), 2);
        assert_ne!(saved[0].id, saved[1].id);
    }

    #[tokio::test]
    async fn received_at_comes_from_clock() {
        let store = RecordingStore::new();
        let (notifier, _notified) = RecordingNotifier::new();
        let fixed = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let pipeline = SubmissionPipeline::new(Arc::new(store.clone()), Arc::new(notifier))
            .with_clock(Arc::new(move || fixed));

        pipeline
            .submit(contact_form("John", "john@example.com", "Hi"))
            .await
            .expect("accepted");

        assert_eq!(store.saved()[0].received_at, fixed);
    }
}
