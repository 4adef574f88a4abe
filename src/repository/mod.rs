//! Repository layer for session and result persistence.
//!
//! The runner depends only on the `SessionStore` and `ResultStore` traits.
//! SQLite repositories (Diesel ORM) back the CLI; `MemoryStore` backs tests
//! and throwaway runs.

pub mod context;
pub mod diesel_result;
pub mod diesel_session;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod util;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    AnnotationResult, AnnotationSession, NewSession, SessionOverview, SessionStatus,
};

pub use context::DbContext;
pub use diesel_result::DieselResultRepository;
pub use diesel_session::DieselSessionRepository;
pub use memory::MemoryStore;
pub use pool::{AsyncSqlitePool, DieselError};
pub use util::{format_datetime, parse_datetime};

/// Errors from session and result stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("{0}")]
    Other(String),
}

/// Partial update applied to a stored session.
///
/// `add_processed` is merged into the stored set; `processed_count` grows by
/// the number of identifiers that were new to the set, in the same write.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub add_processed: Vec<String>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn processed(identifiers: Vec<String>) -> Self {
        Self {
            add_processed: identifiers,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.add_processed.is_empty()
    }
}

/// Persistence for annotation sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new `in_progress` session and return it.
    async fn create_session(&self, new: NewSession) -> Result<AnnotationSession, StoreError>;

    /// Apply a partial update. Fails with `NotFound` for unknown ids.
    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<(), StoreError>;

    /// Load a session with its processed identifiers.
    async fn read_session(&self, id: &str) -> Result<Option<AnnotationSession>, StoreError>;

    /// All sessions for an owner, newest first, without their item sets.
    async fn list_sessions(&self, owner_id: &str) -> Result<Vec<SessionOverview>, StoreError>;

    /// Claim a non-completed session for the run `run_id` and mark it
    /// `in_progress`.
    ///
    /// Returns `false` when another run holds the claim and the session was
    /// updated at or after `stale_before`. Older claims are taken over.
    async fn claim_run(
        &self,
        id: &str,
        run_id: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Drop the claim if `run_id` still holds it.
    async fn release_run(&self, id: &str, run_id: &str) -> Result<(), StoreError>;
}

/// Persistence for annotation results, keyed by (session, identifier).
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert or replace results for a session.
    async fn upsert_results(
        &self,
        session_id: &str,
        results: &[AnnotationResult],
    ) -> Result<(), StoreError>;

    /// All results for a session, ordered by identifier.
    async fn list_results(&self, session_id: &str) -> Result<Vec<AnnotationResult>, StoreError>;
}
