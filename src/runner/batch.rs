//! Batch annotation runner.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::control::{RunGuard, RunRegistry};
use super::error::RunnerError;
use super::events::{RunEvent, RunSummary};
use super::{ResumePolicy, RunnerOptions};
use crate::extract::identifier_digest;
use crate::lookup::LookupService;
use crate::models::{AnnotationResult, AnnotationSession, NewSession, SessionStatus};
use crate::repository::{ResultStore, SessionPatch, SessionStore, StoreError};

/// Drives annotation sessions through the lookup service.
///
/// Stores and lookup are injected so the same runner serves SQLite-backed
/// CLI runs and in-memory tests.
pub struct BatchAnnotationRunner {
    sessions: Arc<dyn SessionStore>,
    results: Arc<dyn ResultStore>,
    lookup: Arc<dyn LookupService>,
    options: RunnerOptions,
    registry: RunRegistry,
}

impl BatchAnnotationRunner {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        results: Arc<dyn ResultStore>,
        lookup: Arc<dyn LookupService>,
        options: RunnerOptions,
    ) -> Result<Self, RunnerError> {
        if options.batch_size == 0 {
            return Err(RunnerError::InvalidBatchSize);
        }
        Ok(Self {
            sessions,
            results,
            lookup,
            options,
            registry: RunRegistry::new(),
        })
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Persist a new `in_progress` session for the given identifiers.
    pub async fn create_session(
        &self,
        owner_id: &str,
        source_name: &str,
        identifiers: &BTreeSet<String>,
    ) -> Result<AnnotationSession, RunnerError> {
        if identifiers.is_empty() {
            return Err(RunnerError::NothingToProcess);
        }

        let session = self
            .sessions
            .create_session(NewSession {
                owner_id: owner_id.to_string(),
                source_name: source_name.to_string(),
                total_items: identifiers.len() as u64,
                source_digest: identifier_digest(identifiers),
            })
            .await?;

        info!(
            "Created session {} for {} ({} identifiers)",
            session.id, source_name, session.total_items
        );
        Ok(session)
    }

    /// Run a session until its identifiers are exhausted or it is paused.
    ///
    /// Events are sent with `send().await`, so the receiver must be drained
    /// while the run is in progress; a full channel stalls the run.
    pub async fn start(
        &self,
        session_id: &str,
        identifiers: &BTreeSet<String>,
        event_tx: mpsc::Sender<RunEvent>,
    ) -> Result<RunSummary, RunnerError> {
        self.run(session_id, identifiers, event_tx).await
    }

    /// Continue a paused session. Identical to `start`.
    pub async fn resume(
        &self,
        session_id: &str,
        identifiers: &BTreeSet<String>,
        event_tx: mpsc::Sender<RunEvent>,
    ) -> Result<RunSummary, RunnerError> {
        self.run(session_id, identifiers, event_tx).await
    }

    /// Ask the active run to stop after its current batch.
    ///
    /// Returns whether a run was active. Calling it again, or with no run
    /// active, changes nothing.
    pub fn pause(&self, session_id: &str) -> bool {
        let active = self.registry.pause(session_id);
        if active {
            info!("Pause requested for session {}", session_id);
        }
        active
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.registry.is_running(session_id)
    }

    /// Look up one identifier outside any session. Touches no store.
    pub async fn lookup_single(
        &self,
        identifier: &str,
    ) -> Result<Vec<AnnotationResult>, RunnerError> {
        Ok(self.lookup.lookup(&[identifier.to_string()]).await?)
    }

    async fn run(
        &self,
        session_id: &str,
        identifiers: &BTreeSet<String>,
        event_tx: mpsc::Sender<RunEvent>,
    ) -> Result<RunSummary, RunnerError> {
        let guard = self
            .registry
            .acquire(session_id)
            .ok_or_else(|| RunnerError::ConcurrentRun(session_id.to_string()))?;

        let session = self
            .sessions
            .read_session(session_id)
            .await?
            .ok_or_else(|| RunnerError::SessionNotFound(session_id.to_string()))?;

        if session.status.is_terminal() {
            info!("Session {} is already completed", session_id);
            let _ = event_tx
                .send(RunEvent::Finished {
                    status: session.status,
                })
                .await;
            return Ok(RunSummary::for_session(&session));
        }

        if identifiers.is_empty() {
            return Err(RunnerError::NothingToProcess);
        }

        let digest = identifier_digest(identifiers);
        if digest != session.source_digest {
            match self.options.resume_policy {
                ResumePolicy::Reject => {
                    return Err(RunnerError::IdentifierMismatch {
                        session_id: session_id.to_string(),
                        expected: session.source_digest.clone(),
                        actual: digest,
                    });
                }
                ResumePolicy::Warn => {
                    warn!(
                        "Identifier list for session {} differs from the one it was created with",
                        session_id
                    );
                    let _ = event_tx
                        .send(RunEvent::IdentifierMismatch {
                            expected: session.source_digest.clone(),
                            actual: digest,
                        })
                        .await;
                }
            }
        }

        // The registry only covers this runner; the store claim covers other
        // processes sharing the database.
        let run_id = uuid::Uuid::new_v4().to_string();
        let stale_before = chrono::Duration::from_std(self.options.stale_run_after)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if !self
            .sessions
            .claim_run(session_id, &run_id, stale_before)
            .await?
        {
            return Err(RunnerError::ConcurrentRun(session_id.to_string()));
        }
        if session.status != SessionStatus::InProgress {
            info!("Resuming session {}", session_id);
        }

        let outcome = self
            .run_claimed(&guard, session, identifiers, &event_tx)
            .await;

        if let Err(e) = self.sessions.release_run(session_id, &run_id).await {
            warn!("Could not release claim on session {}: {}", session_id, e);
        }
        outcome
    }

    async fn run_claimed(
        &self,
        guard: &RunGuard,
        session: AnnotationSession,
        identifiers: &BTreeSet<String>,
        event_tx: &mpsc::Sender<RunEvent>,
    ) -> Result<RunSummary, RunnerError> {
        let session_id = session.id.as_str();
        let mut summary = RunSummary::for_session(&session);
        let mut processed = session.processed_items.clone();
        let remaining: Vec<String> = session
            .remaining(identifiers)
            .into_iter()
            .cloned()
            .collect();
        let batch_size = self.options.batch_size;

        let _ = event_tx
            .send(RunEvent::Started {
                session_id: session_id.to_string(),
                total_items: session.total_items,
                processed_count: processed.len() as u64,
                remaining: remaining.len(),
                batches: remaining.len().div_ceil(batch_size),
            })
            .await;

        let mut interrupted = false;

        for (index, batch) in remaining.chunks(batch_size).enumerate() {
            if !guard.keep_running() {
                interrupted = true;
                break;
            }

            let _ = event_tx
                .send(RunEvent::BatchStarted {
                    index,
                    size: batch.len(),
                })
                .await;
            debug!(
                "Session {}: batch {} ({} identifiers)",
                session_id,
                index,
                batch.len()
            );
            summary.batches_attempted += 1;

            match self.lookup.lookup(batch).await {
                Ok(results) => {
                    let checkpoint = self.checkpoint(session_id, batch, &results).await;
                    self.persist(session_id, checkpoint).await?;

                    processed.extend(batch.iter().cloned());
                    summary.identifiers_processed += batch.len();
                    summary.results_stored += results.len();

                    let _ = event_tx
                        .send(RunEvent::BatchCompleted {
                            index,
                            identifiers: batch.len(),
                            results: results.len(),
                        })
                        .await;
                    let _ = event_tx
                        .send(RunEvent::Progress {
                            processed_count: processed.len() as u64,
                            total_items: session.total_items,
                        })
                        .await;
                }
                Err(e) => {
                    warn!(
                        "Lookup failed for batch {} of session {}: {}",
                        index, session_id, e
                    );
                    summary.batches_failed += 1;
                    summary.failed_identifiers.extend(batch.iter().cloned());
                    let _ = event_tx
                        .send(RunEvent::BatchFailed {
                            index,
                            identifiers: batch.to_vec(),
                            error: e.to_string(),
                        })
                        .await;

                    // Keeps the claim fresh through a run of failing batches.
                    let touched = self
                        .sessions
                        .update_session(session_id, SessionPatch::default())
                        .await;
                    self.persist(session_id, touched).await?;
                }
            }

            // A pause that arrived during this batch takes effect now, even
            // if it was the last one.
            if !guard.keep_running() {
                interrupted = true;
                break;
            }
        }

        // Failed identifiers must stay eligible, and completed is final.
        let status = if interrupted || summary.batches_failed > 0 {
            SessionStatus::Paused
        } else {
            SessionStatus::Completed
        };

        self.persist(
            session_id,
            self.sessions
                .update_session(session_id, SessionPatch::status(status))
                .await,
        )
        .await?;

        summary.status = status;
        summary.processed_count = processed.len() as u64;
        summary.remaining = identifiers.difference(&processed).count();

        info!(
            "Session {} {}: {}/{} processed, {} failed batches",
            session_id, status, summary.processed_count, summary.total_items, summary.batches_failed
        );
        let _ = event_tx.send(RunEvent::Finished { status }).await;

        Ok(summary)
    }

    /// Results first, then progress: a crash between the two re-looks up
    /// the batch instead of losing it.
    async fn checkpoint(
        &self,
        session_id: &str,
        batch: &[String],
        results: &[AnnotationResult],
    ) -> Result<(), StoreError> {
        self.results.upsert_results(session_id, results).await?;
        self.sessions
            .update_session(session_id, SessionPatch::processed(batch.to_vec()))
            .await
    }

    /// On a failed write, try to leave the session `paused` and surface the error.
    async fn persist(
        &self,
        session_id: &str,
        outcome: Result<(), StoreError>,
    ) -> Result<(), RunnerError> {
        let Err(e) = outcome else {
            return Ok(());
        };

        warn!("Persistence failed for session {}: {}", session_id, e);
        if let Err(pause_err) = self
            .sessions
            .update_session(session_id, SessionPatch::status(SessionStatus::Paused))
            .await
        {
            warn!(
                "Could not mark session {} paused after failure: {}",
                session_id, pause_err
            );
        }
        Err(RunnerError::Persistence(e))
    }
}
