//! Resumable batch annotation.
//!
//! `BatchAnnotationRunner` drives one session at a time through its
//! remaining identifiers, checkpointing after every batch so a paused or
//! crashed run picks up where it stopped.

mod batch;
mod control;
mod error;
mod events;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use batch::BatchAnnotationRunner;
pub use control::{RunGuard, RunRegistry};
pub use error::RunnerError;
pub use events::{RunEvent, RunSummary};

/// Default identifiers per lookup call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default age after which another process's claim on a session is ignored.
pub const DEFAULT_STALE_RUN_SECS: u64 = 600;

/// What to do when a resume is handed a different identifier list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumePolicy {
    /// Log and emit an event, then continue with the supplied list.
    #[default]
    Warn,
    /// Refuse to run.
    Reject,
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    pub batch_size: usize,
    pub resume_policy: ResumePolicy,
    /// A claimed session whose last write is older than this is treated as
    /// abandoned by a crashed run. Keep it well above the lookup timeout.
    pub stale_run_after: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            resume_policy: ResumePolicy::default(),
            stale_run_after: Duration::from_secs(DEFAULT_STALE_RUN_SECS),
        }
    }
}
