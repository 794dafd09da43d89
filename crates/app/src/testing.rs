//! In-memory port implementations shared by the app tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use contact_relay_core::{
    ContactForm, NotifyError, StoreError, Submission, SubmissionNotifier, SubmissionStore,
};

pub fn contact_form(name: &str, email: &str, message: &str) -> ContactForm {
    ContactForm {
        name: name.to_string(),
        email: email.to_string(),
        subject: "Hello".to_string(),
        message: message.to_string(),
    }
}

#[derive(Clone, Default)]
pub struct RecordingStore {
    saved: Arc<Mutex<Vec<Submission>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<Submission> {
        self.saved.lock().expect("store lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.saved.lock().expect("store lock").len()
    }
}

#[async_trait]
impl SubmissionStore for RecordingStore {
    async fn save(&self, submission: &Submission) -> Result<(), StoreError> {
        self.saved
            .lock()
            .expect("store lock")
            .push(submission.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct FailingStore {
    error: StoreError,
    calls: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn unavailable(cause: &str) -> Self {
        Self {
            error: StoreError::Unavailable(cause.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionStore for FailingStore {
    async fn save(&self, _submission: &Submission) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Forwards every notified submission to a channel.
pub struct RecordingNotifier {
    sender: mpsc::UnboundedSender<Submission>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Submission>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl SubmissionNotifier for RecordingNotifier {
    async fn notify(&self, submission: &Submission) -> Result<(), NotifyError> {
        let _ = self.sender.send(submission.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FailingNotifier {
    attempted: Arc<Notify>,
}

impl FailingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait_for_attempt(&self) {
        self.attempted.notified().await;
    }
}

#[async_trait]
impl SubmissionNotifier for FailingNotifier {
    async fn notify(&self, _submission: &Submission) -> Result<(), NotifyError> {
        self.attempted.notify_one();
        Err(NotifyError::Transport("connection reset by relay".to_string()))
    }
}

/// Holds every notification until [`BlockingNotifier::release`] is called.
#[derive(Clone, Default)]
pub struct BlockingNotifier {
    gate: Arc<Notify>,
    done: Arc<Notify>,
    finished: Arc<AtomicBool>,
}

impl BlockingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub async fn wait_until_finished(&self) {
        if self.finished() {
            return;
        }
        self.done.notified().await;
    }
}

#[async_trait]
impl SubmissionNotifier for BlockingNotifier {
    async fn notify(&self, _submission: &Submission) -> Result<(), NotifyError> {
        self.gate.notified().await;
        self.finished.store(true, Ordering::SeqCst);
        self.done.notify_one();
        Ok(())
    }
}
