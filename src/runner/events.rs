//! Run events and summaries.

use crate::models::{AnnotationSession, SessionStatus};

/// Events emitted while a session runs.
/// Used by the CLI to drive progress bars and status messages.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        session_id: String,
        total_items: u64,
        processed_count: u64,
        remaining: usize,
        batches: usize,
    },
    /// The identifier list handed to a resume differs from the one the
    /// session was created with.
    IdentifierMismatch {
        expected: String,
        actual: String,
    },
    BatchStarted {
        index: usize,
        size: usize,
    },
    BatchCompleted {
        index: usize,
        identifiers: usize,
        results: usize,
    },
    BatchFailed {
        index: usize,
        identifiers: Vec<String>,
        error: String,
    },
    Progress {
        processed_count: u64,
        total_items: u64,
    },
    Finished {
        status: SessionStatus,
    },
}

/// Outcome of one `start`/`resume` call.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub batches_attempted: usize,
    pub batches_failed: usize,
    /// Identifiers marked processed by this run.
    pub identifiers_processed: usize,
    pub results_stored: usize,
    /// Identifiers from failed batches; still eligible on resume.
    pub failed_identifiers: Vec<String>,
    pub processed_count: u64,
    pub total_items: u64,
    /// Identifiers from the supplied list not yet processed.
    pub remaining: usize,
}

impl RunSummary {
    pub(crate) fn for_session(session: &AnnotationSession) -> Self {
        Self {
            session_id: session.id.clone(),
            status: session.status,
            batches_attempted: 0,
            batches_failed: 0,
            identifiers_processed: 0,
            results_stored: 0,
            failed_identifiers: Vec::new(),
            processed_count: session.processed_count,
            total_items: session.total_items,
            remaining: 0,
        }
    }

    /// True when the run did no lookups at all.
    pub fn is_idle(&self) -> bool {
        self.batches_attempted == 0
    }
}
