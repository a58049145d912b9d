//! Worker error types.

use reels_firestore::FirestoreError;
use reels_models::{JobId, TransitionError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Script generation failed: {0}")]
    ScriptFailed(String),

    #[error("Voice synthesis failed: {0}")]
    VoiceFailed(String),

    #[error("Accent clip generation failed: {0}")]
    AccentFailed(String),

    #[error("Photo fetch failed: {0}")]
    FetchFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job timed out after {0}s")]
    Timeout(u64),

    #[error("Rejected job update: {0}")]
    Transition(#[from] TransitionError),

    #[error("Storage error: {0}")]
    Storage(#[from] reels_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(FirestoreError),

    #[error("Media error: {0}")]
    Media(#[from] reels_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] reels_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FirestoreError> for WorkerError {
    fn from(err: FirestoreError) -> Self {
        match err {
            FirestoreError::Transition(t) => Self::Transition(t),
            other => Self::Firestore(other),
        }
    }
}

impl WorkerError {
    pub fn script_failed(msg: impl Into<String>) -> Self {
        Self::ScriptFailed(msg.into())
    }

    pub fn voice_failed(msg: impl Into<String>) -> Self {
        Self::VoiceFailed(msg.into())
    }

    pub fn accent_failed(msg: impl Into<String>) -> Self {
        Self::AccentFailed(msg.into())
    }

    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::FetchFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether redelivering the task may succeed.
    ///
    /// Only job store and queue failures qualify: stage failures are already
    /// recorded on the job as a terminal error.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Store(_) | WorkerError::Queue(_) => true,
            WorkerError::Firestore(e) => e.is_retryable() || e.is_precondition_failed(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reels_models::JobStatus;

    #[test]
    fn test_transition_errors_are_unwrapped() {
        let err: WorkerError = FirestoreError::Transition(TransitionError::Terminal(JobStatus::Done)).into();
        assert!(matches!(err, WorkerError::Transition(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryability() {
        assert!(WorkerError::from(FirestoreError::RateLimited(100)).is_retryable());
        assert!(WorkerError::store("unavailable").is_retryable());
        assert!(!WorkerError::from(FirestoreError::not_found("jobs/x")).is_retryable());
        assert!(!WorkerError::voice_failed("boom").is_retryable());
        assert!(!WorkerError::JobNotFound(JobId::from_string("x")).is_retryable());
    }
}
