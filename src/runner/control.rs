//! Active-run registry.
//!
//! At most one run per session holds a `RunGuard`. The guard carries the
//! keep-running flag that `pause` clears and removes its registry entry when
//! dropped, so an erroring run never leaves a stale entry behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type ActiveRuns = HashMap<String, Arc<AtomicBool>>;

#[derive(Clone, Default)]
pub struct RunRegistry {
    active: Arc<Mutex<ActiveRuns>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ActiveRuns> {
        // The map stays consistent even if a holder panicked.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the session for a run. `None` if a run is already active.
    pub fn acquire(&self, session_id: &str) -> Option<RunGuard> {
        let mut active = self.lock();
        if active.contains_key(session_id) {
            return None;
        }

        let flag = Arc::new(AtomicBool::new(true));
        active.insert(session_id.to_string(), flag.clone());
        Some(RunGuard {
            registry: self.clone(),
            session_id: session_id.to_string(),
            keep_running: flag,
        })
    }

    /// Clear the keep-running flag. Returns whether a run was active.
    pub fn pause(&self, session_id: &str) -> bool {
        match self.lock().get(session_id) {
            Some(flag) => {
                flag.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }
}

/// Exclusive claim on one session's run.
pub struct RunGuard {
    registry: RunRegistry,
    session_id: String,
    keep_running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn keep_running(&self) -> bool {
        self.keep_running.load(Ordering::SeqCst)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.session_id);
    }
}
