//! Annotation session models.
//!
//! A session tracks one annotation pass over the identifiers extracted from
//! an uploaded file. Progress is the set of identifiers already looked up;
//! the count is kept alongside it for display.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque session identifier (UUID v4 string).
pub type SessionId = String;

/// Lifecycle state of an annotation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Completed sessions have no outgoing transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted annotation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationSession {
    pub id: SessionId,
    /// Owner used to scope session listings.
    pub owner_id: String,
    /// Display name of the input file.
    pub source_name: String,
    pub status: SessionStatus,
    /// Distinct identifiers extracted at creation. Never changes afterwards.
    pub total_items: u64,
    /// Identifiers already looked up, whether or not they produced data.
    pub processed_items: BTreeSet<String>,
    /// Always `processed_items.len()` at a checkpoint.
    pub processed_count: u64,
    /// SHA-256 of the canonical identifier list supplied at creation.
    pub source_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnnotationSession {
    /// Fraction of items processed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total_items == 0 {
            return 1.0;
        }
        (self.processed_count as f64 / self.total_items as f64).min(1.0)
    }

    /// Identifiers from `all` that still need a lookup, in stable order.
    pub fn remaining<'a>(&'a self, all: &'a BTreeSet<String>) -> Vec<&'a String> {
        all.difference(&self.processed_items).collect()
    }

    /// Record identifiers as processed and keep the count in step.
    pub fn mark_processed<I>(&mut self, identifiers: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.processed_items.extend(identifiers);
        self.processed_count = self.processed_items.len() as u64;
    }
}

/// Session row without its processed identifiers, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOverview {
    pub id: SessionId,
    pub owner_id: String,
    pub source_name: String,
    pub status: SessionStatus,
    pub total_items: u64,
    pub processed_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AnnotationSession> for SessionOverview {
    fn from(session: &AnnotationSession) -> Self {
        Self {
            id: session.id.clone(),
            owner_id: session.owner_id.clone(),
            source_name: session.source_name.clone(),
            status: session.status,
            total_items: session.total_items,
            processed_count: session.processed_count,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// Fields supplied when creating a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub owner_id: String,
    pub source_name: String,
    pub total_items: u64,
    pub source_digest: String,
}

impl NewSession {
    /// Build the initial `in_progress` session with a fresh id.
    pub fn into_session(self) -> AnnotationSession {
        let now = Utc::now();
        AnnotationSession {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: self.owner_id,
            source_name: self.source_name,
            status: SessionStatus::InProgress,
            total_items: self.total_items,
            processed_items: BTreeSet::new(),
            processed_count: 0,
            source_digest: self.source_digest,
            created_at: now,
            updated_at: now,
        }
    }
}
