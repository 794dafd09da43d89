//! Contracts the submission pipeline depends on.
//!
//! Storage and delivery live in their own crates; the pipeline only sees
//! these traits, and tests swap in in-memory implementations.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Submission;

/// Durable record of accepted submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Writes one row per call. There is no dedup key.
    async fn save(&self, submission: &Submission) -> Result<(), StoreError>;
}

/// Out-of-band notice that a submission arrived.
#[async_trait]
pub trait SubmissionNotifier: Send + Sync {
    /// Makes at most one delivery attempt.
    async fn notify(&self, submission: &Submission) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage rejected the write: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Rejected(_) => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("failed to build notification: {0}")]
    Message(String),
    #[error("notification transport failed: {0}")]
    Transport(String),
}

impl NotifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Transport(_) => "transport",
        }
    }
}
