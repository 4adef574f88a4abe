//! In-memory session and result store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ResultStore, SessionPatch, SessionStore, StoreError};
use crate::models::{
    AnnotationResult, AnnotationSession, NewSession, SessionOverview, SessionStatus,
};

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, AnnotationSession>,
    results: HashMap<String, BTreeMap<String, AnnotationResult>>,
    /// Session id to the run token holding it.
    claims: HashMap<String, String>,
}

/// Process-local store implementing both `SessionStore` and `ResultStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, new: NewSession) -> Result<AnnotationSession, StoreError> {
        let session = new.into_session();
        self.lock()?
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(status) = patch.status {
            session.status = status;
        }
        session.mark_processed(patch.add_processed);
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn read_session(&self, id: &str) -> Result<Option<AnnotationSession>, StoreError> {
        Ok(self.lock()?.sessions.get(id).cloned())
    }

    async fn list_sessions(&self, owner_id: &str) -> Result<Vec<SessionOverview>, StoreError> {
        let mut sessions: Vec<SessionOverview> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.owner_id == owner_id)
            .map(SessionOverview::from)
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(sessions)
    }

    async fn claim_run(
        &self,
        id: &str,
        run_id: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let Some(session) = inner.sessions.get_mut(id) else {
            return Ok(false);
        };
        if session.status.is_terminal() {
            return Ok(false);
        }
        if inner.claims.contains_key(id) && session.updated_at >= stale_before {
            return Ok(false);
        }

        inner.claims.insert(id.to_string(), run_id.to_string());
        session.status = SessionStatus::InProgress;
        session.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_run(&self, id: &str, run_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.claims.get(id).is_some_and(|holder| holder == run_id) {
            inner.claims.remove(id);
        }
        Ok(())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn upsert_results(
        &self,
        session_id: &str,
        results: &[AnnotationResult],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.sessions.contains_key(session_id) {
            return Err(StoreError::NotFound(session_id.to_string()));
        }

        let stored = inner.results.entry(session_id.to_string()).or_default();
        for result in results {
            stored.insert(result.identifier.clone(), result.clone());
        }
        Ok(())
    }

    async fn list_results(&self, session_id: &str) -> Result<Vec<AnnotationResult>, StoreError> {
        Ok(self
            .lock()?
            .results
            .get(session_id)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default())
    }
}
