//! Runner error types.

use thiserror::Error;

use crate::lookup::LookupError;
use crate::repository::StoreError;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("No identifiers found in input")]
    NothingToProcess,
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("A run is already active for session {0}")]
    ConcurrentRun(String),
    #[error("Identifier list does not match session {session_id} (expected digest {expected}, got {actual})")]
    IdentifierMismatch {
        session_id: String,
        expected: String,
        actual: String,
    },
    #[error("Batch size must be at least 1")]
    InvalidBatchSize,
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("Lookup failed: {0}")]
    Lookup(#[from] LookupError),
}
