//! Integration tests for the batch annotation runner.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use rsannotate::extract::extract_identifiers;
use rsannotate::lookup::{LookupError, LookupService};
use rsannotate::models::{AnnotationResult, SessionStatus};
use rsannotate::repository::{
    DbContext, MemoryStore, ResultStore, SessionPatch, SessionStore, StoreError,
};
use rsannotate::runner::{
    BatchAnnotationRunner, ResumePolicy, RunEvent, RunSummary, RunnerError, RunnerOptions,
};

/// Lookup fake that records every call.
#[derive(Default)]
struct FakeLookup {
    calls: Mutex<Vec<Vec<String>>>,
    /// Zero-based call indices that fail.
    failing_calls: HashSet<usize>,
    /// Identifiers that produce a result. `None` means all of them.
    known: Option<BTreeSet<String>>,
    /// When set, each call signals `entered` then waits for `release`.
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeLookup {
    fn failing(calls: &[usize]) -> Self {
        Self {
            failing_calls: calls.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn gated() -> (Self, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let lookup = Self {
            gate: Some((entered.clone(), release.clone())),
            ..Default::default()
        };
        (lookup, entered, release)
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LookupService for FakeLookup {
    fn name(&self) -> &str {
        "fake"
    }

    async fn lookup(&self, identifiers: &[String]) -> Result<Vec<AnnotationResult>, LookupError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(identifiers.to_vec());
            calls.len() - 1
        };

        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }

        if self.failing_calls.contains(&index) {
            return Err(LookupError::Connection("connection reset".into()));
        }

        Ok(identifiers
            .iter()
            .filter(|id| self.known.as_ref().map_or(true, |k| k.contains(*id)))
            .map(|id| {
                let mut result = AnnotationResult::bare(id.as_str());
                result.gene = Some(format!("GENE_{}", id));
                result
            })
            .collect())
    }
}

/// Result store whose writes always fail.
struct BrokenResults;

#[async_trait]
impl ResultStore for BrokenResults {
    async fn upsert_results(&self, _: &str, _: &[AnnotationResult]) -> Result<(), StoreError> {
        Err(StoreError::Other("disk full".into()))
    }

    async fn list_results(&self, _: &str) -> Result<Vec<AnnotationResult>, StoreError> {
        Ok(Vec::new())
    }
}

fn ids(n: usize) -> BTreeSet<String> {
    (1..=n).map(|i| format!("rs{}", i)).collect()
}

fn runner_with(
    store: &Arc<MemoryStore>,
    lookup: Arc<dyn LookupService>,
    options: RunnerOptions,
) -> BatchAnnotationRunner {
    BatchAnnotationRunner::new(store.clone(), store.clone(), lookup, options).unwrap()
}

/// Collect events on a separate task while the run is in progress.
fn drain_events(mut rx: mpsc::Receiver<RunEvent>) -> tokio::task::JoinHandle<Vec<RunEvent>> {
    tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    })
}

async fn run_to_end(
    runner: &BatchAnnotationRunner,
    session_id: &str,
    identifiers: &BTreeSet<String>,
) -> (Result<RunSummary, RunnerError>, Vec<RunEvent>) {
    let (tx, rx) = mpsc::channel(8);
    let events = drain_events(rx);
    let outcome = runner.start(session_id, identifiers, tx).await;
    (outcome, events.await.unwrap())
}

#[tokio::test]
async fn example_file_completes_with_partial_results() {
    let content = "rs1 . . .\n# comment rs2\nrs1 foo bar\nrs3 baz\n";
    let identifiers = extract_identifiers(content);

    let store = Arc::new(MemoryStore::new());
    let lookup = Arc::new(FakeLookup {
        known: Some(["rs1".to_string()].into_iter().collect()),
        ..Default::default()
    });
    let runner = runner_with(&store, lookup.clone(), RunnerOptions::default());

    let session = runner
        .create_session("local", "example.txt", &identifiers)
        .await
        .unwrap();
    assert_eq!(session.total_items, 2);

    let (outcome, _) = run_to_end(&runner, &session.id, &identifiers).await;
    let summary = outcome.unwrap();
    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(lookup.calls().len(), 1);

    let stored = store.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.processed_items, identifiers);
    assert_eq!(stored.processed_count, 2);

    let results = store.list_results(&session.id).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "rs1");
}

#[tokio::test]
async fn batches_are_sorted_and_sized() {
    let identifiers = ids(25);
    let store = Arc::new(MemoryStore::new());
    let lookup = Arc::new(FakeLookup::default());
    let runner = runner_with(&store, lookup.clone(), RunnerOptions::default());

    let session = runner
        .create_session("local", "a.txt", &identifiers)
        .await
        .unwrap();
    let (outcome, events) = run_to_end(&runner, &session.id, &identifiers).await;
    assert_eq!(outcome.unwrap().batches_attempted, 3);

    let calls = lookup.calls();
    assert_eq!(
        calls.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![10, 10, 5]
    );
    let flattened: Vec<String> = calls.concat();
    let expected: Vec<String> = identifiers.iter().cloned().collect();
    assert_eq!(flattened, expected);

    // processed_count never goes backwards and ends at the total.
    let progress: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Progress {
                processed_count, ..
            } => Some(*processed_count),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![10, 20, 25]);
    assert!(matches!(
        events.last(),
        Some(RunEvent::Finished {
            status: SessionStatus::Completed
        })
    ));
}

#[tokio::test]
async fn resume_after_completion_does_no_work() {
    let identifiers = ids(12);
    let store = Arc::new(MemoryStore::new());
    let lookup = Arc::new(FakeLookup::default());
    let runner = runner_with(&store, lookup.clone(), RunnerOptions::default());

    let session = runner
        .create_session("local", "a.txt", &identifiers)
        .await
        .unwrap();
    run_to_end(&runner, &session.id, &identifiers).await.0.unwrap();
    let calls_after_first = lookup.calls().len();
    let results_before = store.list_results(&session.id).await.unwrap();

    let (tx, _rx) = mpsc::channel(16);
    let summary = runner.resume(&session.id, &identifiers, tx).await.unwrap();
    assert!(summary.is_idle());
    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(lookup.calls().len(), calls_after_first);

    let stored = store.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.processed_items, identifiers);
    assert_eq!(store.list_results(&session.id).await.unwrap(), results_before);
}

#[tokio::test]
async fn failed_batch_is_skipped_then_retried_on_resume() {
    let identifiers = ids(25);
    let store = Arc::new(MemoryStore::new());
    let failing = Arc::new(FakeLookup::failing(&[1]));
    let runner = runner_with(&store, failing.clone(), RunnerOptions::default());

    let session = runner
        .create_session("local", "a.txt", &identifiers)
        .await
        .unwrap();
    let (outcome, events) = run_to_end(&runner, &session.id, &identifiers).await;
    let summary = outcome.unwrap();

    // The loop carries on past the failure.
    assert_eq!(failing.calls().len(), 3);
    assert_eq!(summary.batches_failed, 1);
    assert_eq!(summary.status, SessionStatus::Paused);
    let failed_batch = failing.calls()[1].clone();
    assert_eq!(summary.failed_identifiers, failed_batch);
    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::BatchFailed { index: 1, .. })));

    let stored = store.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.processed_count, 15);
    for id in &failed_batch {
        assert!(!stored.processed_items.contains(id));
    }

    let healthy = Arc::new(FakeLookup::default());
    let runner = runner_with(&store, healthy.clone(), RunnerOptions::default());
    let (outcome, _) = run_to_end(&runner, &session.id, &identifiers).await;
    assert_eq!(outcome.unwrap().status, SessionStatus::Completed);
    assert_eq!(healthy.calls(), vec![failed_batch]);

    let stored = store.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.processed_items, identifiers);
    assert_eq!(stored.processed_count, 25);
}

#[tokio::test]
async fn pause_stops_after_in_flight_batch() {
    let identifiers = ids(30);
    let store = Arc::new(MemoryStore::new());
    let (lookup, entered, release) = FakeLookup::gated();
    let lookup = Arc::new(lookup);
    let runner = Arc::new(runner_with(&store, lookup.clone(), RunnerOptions::default()));

    let session = runner
        .create_session("local", "a.txt", &identifiers)
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel(1024);
    let task = {
        let runner = runner.clone();
        let session_id = session.id.clone();
        let identifiers = identifiers.clone();
        tokio::spawn(async move { runner.start(&session_id, &identifiers, tx).await })
    };

    entered.notified().await;
    assert!(runner.is_running(&session.id));
    assert!(runner.pause(&session.id));
    assert!(runner.pause(&session.id));
    release.notify_one();

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.status, SessionStatus::Paused);
    assert_eq!(summary.batches_attempted, 1);
    assert_eq!(lookup.calls().len(), 1);
    assert!(!runner.is_running(&session.id));
    assert!(!runner.pause(&session.id));

    let mut last_progress = 0;
    while let Some(event) = rx.recv().await {
        if let RunEvent::Progress {
            processed_count, ..
        } = event
        {
            assert!(processed_count >= last_progress);
            last_progress = processed_count;
        }
    }
    assert_eq!(last_progress, 10);

    let stored = store.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Paused);
    assert_eq!(stored.processed_count, 10);
    assert_eq!(store.list_results(&session.id).await.unwrap().len(), 10);

    // Resume carries on from the checkpoint without repeating batch 0.
    let healthy = Arc::new(FakeLookup::default());
    let resumed = runner_with(&store, healthy.clone(), RunnerOptions::default());
    let (outcome, _) = run_to_end(&resumed, &session.id, &identifiers).await;
    assert_eq!(outcome.unwrap().status, SessionStatus::Completed);
    assert_eq!(healthy.calls().len(), 2);
    assert!(!healthy.calls().concat().contains(&"rs1".to_string()));
}

#[tokio::test]
async fn second_run_on_same_session_is_rejected() {
    let identifiers = ids(5);
    let store = Arc::new(MemoryStore::new());
    let (lookup, entered, release) = FakeLookup::gated();
    let runner = Arc::new(runner_with(&store, Arc::new(lookup), RunnerOptions::default()));

    let session = runner
        .create_session("local", "a.txt", &identifiers)
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel(1024);
    let task = {
        let runner = runner.clone();
        let session_id = session.id.clone();
        let identifiers = identifiers.clone();
        tokio::spawn(async move { runner.start(&session_id, &identifiers, tx).await })
    };
    entered.notified().await;

    let (tx2, _rx2) = mpsc::channel(16);
    let err = runner
        .resume(&session.id, &identifiers, tx2)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::ConcurrentRun(ref id) if *id == session.id));

    let stored = store.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::InProgress);
    assert_eq!(stored.processed_count, 0);

    release.notify_one();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.status, SessionStatus::Completed);
}

#[tokio::test]
async fn persistence_failure_pauses_session() {
    let identifiers = ids(15);
    let sessions = Arc::new(MemoryStore::new());
    let runner = BatchAnnotationRunner::new(
        sessions.clone(),
        Arc::new(BrokenResults),
        Arc::new(FakeLookup::default()),
        RunnerOptions::default(),
    )
    .unwrap();

    let session = runner
        .create_session("local", "a.txt", &identifiers)
        .await
        .unwrap();
    let (tx, _rx) = mpsc::channel(1024);
    let err = runner.start(&session.id, &identifiers, tx).await.unwrap_err();
    assert!(matches!(err, RunnerError::Persistence(_)));

    let stored = sessions.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Paused);
    assert!(stored.processed_items.is_empty());
    assert!(!runner.is_running(&session.id));
}

#[tokio::test]
async fn changed_identifier_list_warns_or_rejects() {
    let original = ids(4);
    let changed = ids(6);
    let store = Arc::new(MemoryStore::new());

    let strict = runner_with(
        &store,
        Arc::new(FakeLookup::default()),
        RunnerOptions {
            resume_policy: ResumePolicy::Reject,
            ..Default::default()
        },
    );
    let session = strict
        .create_session("local", "a.txt", &original)
        .await
        .unwrap();
    store
        .update_session(&session.id, SessionPatch::status(SessionStatus::Paused))
        .await
        .unwrap();

    let (outcome, _) = run_to_end(&strict, &session.id, &changed).await;
    assert!(matches!(
        outcome,
        Err(RunnerError::IdentifierMismatch { .. })
    ));
    let stored = store.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Paused);

    let lenient = runner_with(
        &store,
        Arc::new(FakeLookup::default()),
        RunnerOptions::default(),
    );
    let (outcome, events) = run_to_end(&lenient, &session.id, &changed).await;
    assert_eq!(outcome.unwrap().status, SessionStatus::Completed);
    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::IdentifierMismatch { .. })));
}

#[tokio::test]
async fn invalid_inputs_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let lookup: Arc<dyn LookupService> = Arc::new(FakeLookup::default());

    let err = BatchAnnotationRunner::new(
        store.clone(),
        store.clone(),
        lookup.clone(),
        RunnerOptions {
            batch_size: 0,
            ..Default::default()
        },
    )
    .err()
    .unwrap();
    assert!(matches!(err, RunnerError::InvalidBatchSize));

    let runner = runner_with(&store, lookup, RunnerOptions::default());
    let err = runner
        .create_session("local", "empty.txt", &extract_identifiers("# nothing\n"))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::NothingToProcess));

    let (outcome, _) = run_to_end(&runner, "missing", &ids(1)).await;
    assert!(matches!(outcome, Err(RunnerError::SessionNotFound(_))));
}

#[tokio::test]
async fn single_lookup_touches_no_store() {
    let store = Arc::new(MemoryStore::new());
    let lookup = Arc::new(FakeLookup::default());
    let runner = runner_with(&store, lookup.clone(), RunnerOptions::default());

    let results = runner.lookup_single("rs429358").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].gene.as_deref(), Some("GENE_rs429358"));
    assert_eq!(lookup.calls(), vec![vec!["rs429358".to_string()]]);
    assert!(store.list_sessions("local").await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_session_survives_runner_restart() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = DbContext::new(&dir.path().join("runs.db"));
    ctx.migrate().await.unwrap();

    let identifiers = ids(20);
    let options = RunnerOptions {
        batch_size: 5,
        ..Default::default()
    };

    let session_id = {
        let (sessions, results) = ctx.stores();
        let runner = BatchAnnotationRunner::new(
            sessions,
            results,
            Arc::new(FakeLookup::failing(&[2, 3])),
            options,
        )
        .unwrap();
        let session = runner
            .create_session("local", "genome.txt", &identifiers)
            .await
            .unwrap();
        let (tx, _rx) = mpsc::channel(1024);
        let summary = runner.start(&session.id, &identifiers, tx).await.unwrap();
        assert_eq!(summary.status, SessionStatus::Paused);
        assert_eq!(summary.processed_count, 10);
        session.id
    };

    let stored = ctx.sessions().read_session(&session_id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Paused);
    assert_eq!(stored.processed_count, 10);

    let (sessions, results) = ctx.stores();
    let lookup = Arc::new(FakeLookup::default());
    let runner = BatchAnnotationRunner::new(sessions, results, lookup.clone(), options).unwrap();
    let (tx, _rx) = mpsc::channel(1024);
    let summary = runner.resume(&session_id, &identifiers, tx).await.unwrap();
    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(lookup.calls().len(), 2);

    let stored = ctx.sessions().read_session(&session_id).await.unwrap().unwrap();
    assert_eq!(stored.processed_items, identifiers);
    assert_eq!(stored.processed_count, 20);
    assert_eq!(ctx.results().list_results(&session_id).await.unwrap().len(), 20);
}

#[tokio::test]
async fn pause_during_last_batch_ends_paused() {
    let identifiers = ids(10);
    let store = Arc::new(MemoryStore::new());
    let (lookup, entered, release) = FakeLookup::gated();
    let runner = Arc::new(runner_with(&store, Arc::new(lookup), RunnerOptions::default()));

    let session = runner
        .create_session("local", "a.txt", &identifiers)
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(8);
    let events = drain_events(rx);
    let task = {
        let runner = runner.clone();
        let session_id = session.id.clone();
        let identifiers = identifiers.clone();
        tokio::spawn(async move { runner.start(&session_id, &identifiers, tx).await })
    };

    entered.notified().await;
    assert!(runner.pause(&session.id));
    release.notify_one();

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.status, SessionStatus::Paused);
    assert_eq!(summary.processed_count, 10);
    assert_eq!(summary.remaining, 0);
    assert!(matches!(
        events.await.unwrap().last(),
        Some(RunEvent::Finished {
            status: SessionStatus::Paused
        })
    ));

    let stored = store.read_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Paused);
    assert_eq!(stored.processed_count, 10);

    // Nothing is left, so the resume completes without a lookup.
    let healthy = Arc::new(FakeLookup::default());
    let resumed = runner_with(&store, healthy.clone(), RunnerOptions::default());
    let (outcome, _) = run_to_end(&resumed, &session.id, &identifiers).await;
    let summary = outcome.unwrap();
    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.batches_attempted, 0);
    assert!(healthy.calls().is_empty());
}

#[tokio::test]
async fn runners_sharing_a_database_do_not_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = DbContext::new(&dir.path().join("runs.db"));
    ctx.migrate().await.unwrap();
    let identifiers = ids(15);

    let (lookup, entered, release) = FakeLookup::gated();
    let first = {
        let (sessions, results) = ctx.stores();
        let runner = BatchAnnotationRunner::new(
            sessions,
            results,
            Arc::new(lookup),
            RunnerOptions::default(),
        )
        .unwrap();
        Arc::new(runner)
    };
    let session = first
        .create_session("local", "genome.txt", &identifiers)
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(8);
    let first_events = drain_events(rx);
    let task = {
        let runner = first.clone();
        let session_id = session.id.clone();
        let identifiers = identifiers.clone();
        tokio::spawn(async move { runner.start(&session_id, &identifiers, tx).await })
    };
    entered.notified().await;

    // A second process opens the same database with its own runner.
    let other_lookup = Arc::new(FakeLookup::default());
    let (sessions, results) = ctx.stores();
    let second = BatchAnnotationRunner::new(
        sessions,
        results,
        other_lookup.clone(),
        RunnerOptions::default(),
    )
    .unwrap();
    let (outcome, _) = run_to_end(&second, &session.id, &identifiers).await;
    assert!(matches!(outcome, Err(RunnerError::ConcurrentRun(ref id)) if *id == session.id));
    assert!(other_lookup.calls().is_empty());

    // Let the first run finish both of its batches.
    release.notify_one();
    entered.notified().await;
    release.notify_one();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.status, SessionStatus::Completed);
    first_events.await.unwrap();

    // The claim is gone once the first run ends.
    let (outcome, _) = run_to_end(&second, &session.id, &identifiers).await;
    assert!(outcome.unwrap().is_idle());
    assert!(other_lookup.calls().is_empty());
}

#[tokio::test]
async fn abandoned_claim_is_taken_over_once_stale() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = DbContext::new(&dir.path().join("runs.db"));
    ctx.migrate().await.unwrap();
    let identifiers = ids(3);

    let (sessions, results) = ctx.stores();
    let lookup = Arc::new(FakeLookup::default());
    let runner = BatchAnnotationRunner::new(
        sessions.clone(),
        results.clone(),
        lookup.clone(),
        RunnerOptions::default(),
    )
    .unwrap();
    let session = runner
        .create_session("local", "genome.txt", &identifiers)
        .await
        .unwrap();

    // A crashed process left its claim behind.
    assert!(ctx
        .sessions()
        .claim_run(&session.id, "crashed", chrono::Utc::now())
        .await
        .unwrap());

    let (outcome, _) = run_to_end(&runner, &session.id, &identifiers).await;
    assert!(matches!(outcome, Err(RunnerError::ConcurrentRun(_))));
    assert!(lookup.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(5)).await;
    let impatient = BatchAnnotationRunner::new(
        sessions,
        results,
        lookup.clone(),
        RunnerOptions {
            stale_run_after: Duration::ZERO,
            ..Default::default()
        },
    )
    .unwrap();
    let (outcome, _) = run_to_end(&impatient, &session.id, &identifiers).await;
    assert_eq!(outcome.unwrap().status, SessionStatus::Completed);
    assert_eq!(lookup.calls().len(), 1);
}

#[tokio::test]
async fn drained_run_is_not_held_up_by_a_small_event_buffer() {
    let identifiers = ids(200);
    let store = Arc::new(MemoryStore::new());
    let runner = runner_with(
        &store,
        Arc::new(FakeLookup::default()),
        RunnerOptions {
            batch_size: 5,
            ..Default::default()
        },
    );
    let session = runner
        .create_session("local", "big.txt", &identifiers)
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(1);
    let events = drain_events(rx);
    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        runner.start(&session.id, &identifiers, tx),
    )
    .await
    .expect("run stalled on a full event channel")
    .unwrap();
    assert_eq!(summary.status, SessionStatus::Completed);

    let progress = events
        .await
        .unwrap()
        .into_iter()
        .filter(|e| matches!(e, RunEvent::Progress { .. }))
        .count();
    assert_eq!(progress, 40);
}
