//! Shared error types for the services crate.

use thiserror::Error;

use lunora_core::model::{SessionError, SessionId};
use lunora_storage::repository::StorageError;

/// Errors emitted by `QuestionGenerator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeneratorError {
    #[error("question generation is not configured")]
    Disabled,
    #[error("generator returned an empty response")]
    EmptyResponse,
    #[error("generator payload is not a question list: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("generator request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `SessionSyncService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionSyncError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session {0} does not belong to the requesting user")]
    Unauthorized(SessionId),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
