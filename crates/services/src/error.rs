//! Shared error types for the services crate.

use thiserror::Error;

use certi_core::model::{LevelPlanError, ProgressError, TestSessionError};
use storage::repository::StorageError;

/// Errors emitted by remote exam-function clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("invalid API base URL")]
    InvalidBaseUrl,
    #[error("remote call failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("malformed remote payload: {0}")]
    Payload(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `CertificationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificationError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressTrackerError {
    #[error(transparent)]
    Plan(#[from] LevelPlanError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Certification(#[from] CertificationError),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
    #[error("session already completed")]
    Completed,
    #[error("an explanation is awaiting acknowledgement")]
    PendingExplanation,
    #[error("no explanation to acknowledge")]
    NothingToAcknowledge,
    #[error("session is not finished")]
    Incomplete,
    #[error(transparent)]
    Summary(#[from] TestSessionError),
    #[error(transparent)]
    Tracker(#[from] ProgressTrackerError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
