mod support;

use bulkdigest::batch::{
    query_status, reset_progress, BatchError, BatchRunner, ResumeMode, RunOptions, RunOutcome,
    RunPhase,
};
use bulkdigest::catalog::{CatalogError, SourceRef, StaticCatalog, WorkCatalog, WorkItem};
use bulkdigest::client::{
    ContentFetcher, FetchError, FetchedContent, RecordingPacer, SKIP_UNREADABLE,
};
use bulkdigest::progress::{ProcessedResult, ProgressSnapshot, ProgressStore, ResultStatus};
use bulkdigest::shared::logging::RunLog;
use bulkdigest::sink::{ResultSink, SinkError};
use chrono::Utc;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{abc_catalog, item, summary_for, MapFetcher, ScriptedGenerator, IDENTITY};
use tempfile::tempdir;

const ABC_ARTIFACT: &str = "displayName,directoryPath,outputText\r\n\
a.txt,docs,summary of a.txt\r\n\
b.bin,docs,[skipped: unreadable]\r\n\
c.txt,docs,summary of c.txt\r\n";

struct Harness {
    root: PathBuf,
    generator: Arc<ScriptedGenerator>,
    pacer: Arc<RecordingPacer>,
}

impl Harness {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            generator: Arc::new(ScriptedGenerator::new()),
            pacer: Arc::new(RecordingPacer::new()),
        }
    }

    fn store(&self) -> ProgressStore {
        ProgressStore::new(self.root.join("progress/checkpoint.json"))
    }

    fn output_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    fn artifact(&self) -> PathBuf {
        self.output_dir().join(format!("digest-{IDENTITY}.csv"))
    }

    fn runner(
        &self,
        catalog: impl WorkCatalog + 'static,
        fetcher: impl ContentFetcher + 'static,
        options: RunOptions,
    ) -> BatchRunner {
        self.runner_with_sink(catalog, fetcher, ResultSink::new(self.output_dir()), options)
    }

    fn runner_with_sink(
        &self,
        catalog: impl WorkCatalog + 'static,
        fetcher: impl ContentFetcher + 'static,
        sink: ResultSink,
        options: RunOptions,
    ) -> BatchRunner {
        let client = bulkdigest::client::RateLimitedClient::new(
            Box::new(fetcher),
            self.generator.clone(),
            self.pacer.clone(),
            bulkdigest::client::RetryPolicy::default(),
            support::limits(),
        );
        BatchRunner::new(Box::new(catalog), self.store(), client, sink, options)
    }
}

fn chunked(chunk_size: usize) -> RunOptions {
    RunOptions {
        chunk_size,
        ..RunOptions::default()
    }
}

/// Runs until the fetcher panics on `path`, mimicking a process kill mid-item.
fn crash_on(harness: &Harness, path: &str, chunk_size: usize) {
    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner(catalog, fetcher.crashing_on(path), chunked(chunk_size));
    let crashed = catch_unwind(AssertUnwindSafe(|| runner.run()));
    assert!(crashed.is_err(), "run should have been killed on {path}");
}

/// Wraps a fetcher and calls `hook` before every fetch.
struct HookFetcher<F> {
    inner: MapFetcher,
    hook: F,
}

impl<F: Fn(&SourceRef)> ContentFetcher for HookFetcher<F> {
    fn fetch(&self, source: &SourceRef, max_bytes: u64) -> Result<FetchedContent, FetchError> {
        (self.hook)(source);
        self.inner.fetch(source, max_bytes)
    }
}

struct UnavailableCatalog;

impl WorkCatalog for UnavailableCatalog {
    fn source_identity(&self) -> &str {
        IDENTITY
    }

    fn list(&self) -> Result<Vec<WorkItem>, CatalogError> {
        Err(CatalogError::Unavailable {
            path: "catalog.csv".to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

#[test]
fn full_run_writes_artifact_and_clears_checkpoint() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner(catalog, fetcher, chunked(1));

    let report = runner.run().expect("run");

    assert_eq!(
        report.outcome,
        RunOutcome::Completed {
            artifact: harness.artifact()
        }
    );
    assert_eq!(report.total, 3);
    assert_eq!(report.resumed_from, 0);
    assert_eq!(report.processed_now, 3);
    assert_eq!(report.counts.succeeded, 2);
    assert_eq!(report.counts.skipped, 1);
    assert_eq!(report.counts.failed, 0);
    assert_eq!(report.checkpoints_written, 3);
    assert!(!harness.store().exists());
    assert_eq!(
        fs::read_to_string(harness.artifact()).expect("artifact"),
        ABC_ARTIFACT
    );
    assert_eq!(
        harness.generator.requested_names(),
        vec!["a.txt".to_string(), "c.txt".to_string()]
    );
    assert_eq!(runner.phase(), RunPhase::Done);
}

#[test]
fn pacing_follows_remote_calls_but_not_the_final_item() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner(catalog, fetcher, RunOptions::default());

    runner.run().expect("run");

    assert_eq!(harness.pacer.pauses(), vec![Duration::from_secs(3)]);
}

#[test]
fn crash_then_resume_processes_only_remaining_items() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    crash_on(&harness, "b.bin", 1);

    let saved = harness.store().load().expect("load").expect("checkpoint");
    assert_eq!(saved.last_processed_index, 1);
    assert_eq!(saved.results[0].status, ResultStatus::Succeeded);
    assert_eq!(saved.results[0].output_text, summary_for("a.txt"));

    let resumed = Harness {
        root: dir.path().to_path_buf(),
        generator: Arc::new(ScriptedGenerator::new()),
        pacer: Arc::new(RecordingPacer::new()),
    };
    let (catalog, fetcher) = abc_catalog();
    let mut runner = resumed.runner(catalog, fetcher.clone(), chunked(1));
    let report = runner.run().expect("resume");

    assert_eq!(report.resumed_from, 1);
    assert_eq!(report.processed_now, 2);
    assert_eq!(
        fetcher.requested(),
        vec!["b.bin".to_string(), "c.txt".to_string()]
    );
    assert_eq!(resumed.generator.requested_names(), vec!["c.txt".to_string()]);
    assert_eq!(
        fs::read_to_string(resumed.artifact()).expect("artifact"),
        ABC_ARTIFACT
    );
}

#[test]
fn interrupted_runs_resume_to_the_uninterrupted_artifact() {
    let paths = ["a.txt", "b.bin", "c.txt"];
    for (killed_at, path) in paths.iter().enumerate() {
        let dir = tempdir().expect("tempdir");
        let harness = Harness::new(dir.path());
        crash_on(&harness, path, 1);

        let saved = harness.store().load().expect("load");
        match killed_at {
            0 => assert!(saved.is_none()),
            k => assert_eq!(saved.expect("checkpoint").last_processed_index, k),
        }

        let (catalog, fetcher) = abc_catalog();
        let mut runner = harness.runner(catalog, fetcher.clone(), chunked(1));
        let report = runner.run().expect("resume");

        assert_eq!(report.resumed_from, killed_at);
        let expected: Vec<String> = paths[killed_at..].iter().map(|p| p.to_string()).collect();
        assert_eq!(fetcher.requested(), expected);
        assert_eq!(
            fs::read_to_string(harness.artifact()).expect("artifact"),
            ABC_ARTIFACT,
            "killed at item {killed_at}"
        );
        assert!(!harness.store().exists());
    }
}

#[test]
fn fully_processed_checkpoint_only_rebuilds_the_artifact() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let blocked_output = dir.path().join("not-a-dir");
    fs::write(&blocked_output, "file in the way").expect("write blocker");

    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner_with_sink(
        catalog,
        fetcher,
        ResultSink::new(&blocked_output),
        chunked(10),
    );
    let err = runner.run().expect_err("artifact write must fail");
    assert!(matches!(err, BatchError::Sink(SinkError::Write { .. })));
    assert_eq!(runner.phase(), RunPhase::Failed);
    let saved = harness.store().load().expect("load").expect("checkpoint kept");
    assert_eq!(saved.last_processed_index, 3);

    let retry = Harness {
        root: dir.path().to_path_buf(),
        generator: Arc::new(ScriptedGenerator::new()),
        pacer: Arc::new(RecordingPacer::new()),
    };
    let (catalog, fetcher) = abc_catalog();
    let mut runner = retry.runner(catalog, fetcher.clone(), chunked(10));
    let report = runner.run().expect("finalize");

    assert_eq!(report.resumed_from, 3);
    assert_eq!(report.processed_now, 0);
    assert!(fetcher.requested().is_empty());
    assert_eq!(retry.generator.call_count(), 0);
    assert_eq!(
        fs::read_to_string(retry.artifact()).expect("artifact"),
        ABC_ARTIFACT
    );
}

#[test]
fn checkpoints_advance_monotonically_at_chunk_boundaries() {
    for (chunk_size, expected) in [(1, vec![0, 1, 2]), (2, vec![0, 0, 2])] {
        let dir = tempdir().expect("tempdir");
        let harness = Harness::new(dir.path());
        let observed = Arc::new(Mutex::new(Vec::new()));
        let store = harness.store();
        let seen = observed.clone();
        let (catalog, inner) = abc_catalog();
        let fetcher = HookFetcher {
            inner,
            hook: move |_: &SourceRef| {
                let index = store
                    .load()
                    .expect("load")
                    .map(|s| s.last_processed_index)
                    .unwrap_or(0);
                seen.lock().expect("lock").push(index);
            },
        };

        let mut runner = harness.runner(catalog, fetcher, chunked(chunk_size));
        runner.run().expect("run");

        assert_eq!(*observed.lock().expect("lock"), expected, "chunk {chunk_size}");
    }
}

#[test]
fn checkpoint_from_another_catalog_is_ignored() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let old = item("a.txt", 1024);
    let stale = ProgressSnapshot::new(
        "2024-03-14",
        None,
        vec![ProcessedResult::succeeded(&old, "old summary")],
        Utc::now(),
    );
    harness.store().save(&stale).expect("seed");

    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner(catalog, fetcher, chunked(1));
    let report = runner.run().expect("run");

    assert_eq!(report.resumed_from, 0);
    assert_eq!(report.processed_now, 3);
    assert_eq!(
        fs::read_to_string(harness.artifact()).expect("artifact"),
        ABC_ARTIFACT
    );
}

#[test]
fn catalog_drift_under_the_same_identity_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    crash_on(&harness, "c.txt", 1);

    let drifted = StaticCatalog::new(
        IDENTITY,
        vec![item("a.txt", 1024), item("z.txt", 10), item("c.txt", 500)],
    );
    let (_, fetcher) = abc_catalog();
    let mut runner = harness.runner(drifted, fetcher.clone(), chunked(1));
    let err = runner.run().expect_err("drift");

    assert!(matches!(err, BatchError::CatalogDrift { .. }));
    assert_eq!(runner.phase(), RunPhase::Failed);
    assert!(fetcher.requested().is_empty());
    assert!(harness.store().exists());
}

#[test]
fn corrupt_checkpoint_is_fatal_and_left_in_place() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let path = harness.store().path().to_path_buf();
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, "{\"schemaVersion\": 1, \"results\": [").expect("write");

    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner(catalog, fetcher.clone(), chunked(1));
    let err = runner.run().expect_err("corrupt");

    assert!(matches!(err, BatchError::Progress(_)));
    assert!(fetcher.requested().is_empty());
    assert_eq!(
        fs::read_to_string(&path).expect("read"),
        "{\"schemaVersion\": 1, \"results\": ["
    );
}

#[test]
fn unavailable_catalog_is_fatal_before_any_item() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let fetcher = MapFetcher::default();
    let mut runner = harness.runner(UnavailableCatalog, fetcher.clone(), chunked(1));

    let err = runner.run().expect_err("catalog");

    assert!(matches!(
        err,
        BatchError::Catalog(CatalogError::Unavailable { .. })
    ));
    assert_eq!(
        runner.phase_history(),
        &[RunPhase::Idle, RunPhase::Resuming, RunPhase::Failed]
    );
    assert!(fetcher.requested().is_empty());
}

#[test]
fn failed_checkpoint_writes_do_not_stop_processing() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    fs::write(dir.path().join("progress"), "file in the way").expect("write blocker");

    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner(catalog, fetcher.clone(), chunked(1));
    let err = runner.run().expect_err("checkpoint cannot be cleared");

    assert!(matches!(
        err,
        BatchError::Sink(SinkError::ClearCheckpoint { .. })
    ));
    assert_eq!(fetcher.requested().len(), 3);
    assert_eq!(harness.generator.call_count(), 2);
    assert_eq!(
        fs::read_to_string(harness.artifact()).expect("artifact"),
        ABC_ARTIFACT
    );
}

#[test]
fn stop_signal_checkpoints_and_interrupts_between_items() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let stop = dir.path().join("stop");
    let trigger = stop.clone();
    let (catalog, inner) = abc_catalog();
    let fetcher = HookFetcher {
        inner: inner.clone(),
        hook: move |source: &SourceRef| {
            if source.path == "b.bin" {
                fs::write(&trigger, "").expect("stop file");
            }
        },
    };
    let options = RunOptions {
        chunk_size: 10,
        stop_signal: Some(stop.clone()),
        ..RunOptions::default()
    };

    let mut runner = harness.runner(catalog, fetcher, options);
    let report = runner.run().expect("run");

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.processed_now, 2);
    assert_eq!(runner.phase(), RunPhase::Interrupted);
    assert!(!stop.exists());
    assert!(!harness.artifact().exists());
    let saved = harness.store().load().expect("load").expect("checkpoint");
    assert_eq!(saved.last_processed_index, 2);
    assert_eq!(
        saved.results[1].status,
        ResultStatus::Skipped(SKIP_UNREADABLE.to_string())
    );
    assert_eq!(
        inner.requested(),
        vec!["a.txt".to_string(), "b.bin".to_string()]
    );
}

#[test]
fn leftover_stop_file_is_cleared_at_startup() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let stop = dir.path().join("stop");
    fs::write(&stop, "stop\n").expect("stop file");
    let options = RunOptions {
        chunk_size: 1,
        stop_signal: Some(stop.clone()),
        ..RunOptions::default()
    };

    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner(catalog, fetcher, options);
    let report = runner.run().expect("run");

    assert!(matches!(report.outcome, RunOutcome::Completed { .. }));
    assert_eq!(report.processed_now, 3);
    assert_eq!(harness.generator.call_count(), 2);
    assert!(!stop.exists());
}

#[test]
fn failed_checkpoint_is_retried_only_at_chunk_boundaries() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    fs::write(dir.path().join("progress"), "file in the way").expect("write blocker");
    let log_path = dir.path().join("logs/run.log");

    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness
        .runner(catalog, fetcher, chunked(2))
        .with_log(RunLog::new(&log_path));
    runner.run().expect_err("checkpoint cannot be cleared");

    let log = fs::read_to_string(&log_path).expect("run log");
    let failed_saves = log
        .lines()
        .filter(|line| line.contains("\"event\":\"checkpoint.save_failed\""))
        .count();
    // one attempt at the chunk boundary after item 2, one before finalizing
    assert_eq!(failed_saves, 2);
}

#[test]
fn fresh_mode_discards_existing_progress() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    crash_on(&harness, "c.txt", 1);

    let (catalog, fetcher) = abc_catalog();
    let options = RunOptions {
        chunk_size: 1,
        resume: ResumeMode::Fresh,
        ..RunOptions::default()
    };
    let mut runner = harness.runner(catalog, fetcher.clone(), options);
    let report = runner.run().expect("run");

    assert_eq!(report.resumed_from, 0);
    assert_eq!(fetcher.requested().len(), 3);
}

#[test]
fn status_query_is_read_only_and_estimates_remaining_time() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    crash_on(&harness, "b.bin", 1);
    let before = fs::read(harness.store().path()).expect("checkpoint bytes");

    let (catalog, _) = abc_catalog();
    let first = query_status(Some(&catalog as &dyn WorkCatalog), &harness.store(), Duration::from_secs(3))
        .expect("status");
    let second = query_status(Some(&catalog as &dyn WorkCatalog), &harness.store(), Duration::from_secs(3))
        .expect("status");

    assert_eq!(first, second);
    assert_eq!(first.total, Some(3));
    assert_eq!(first.processed, 1);
    assert_eq!(first.remaining, Some(2));
    assert_eq!(first.eta, Some(Duration::from_secs(6)));
    assert!(!first.stale);
    assert_eq!(fs::read(harness.store().path()).expect("bytes"), before);
    assert!(first.render().contains("progress: 1/3 processed, 2 remaining"));
}

#[test]
fn status_reports_unavailable_catalog_without_failing() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());

    let report = query_status(
        Some(&UnavailableCatalog as &dyn WorkCatalog),
        &harness.store(),
        Duration::from_secs(3),
    )
    .expect("status");

    assert_eq!(report.total, None);
    assert!(report.catalog_error.is_some());
    assert!(report.render().contains("checkpoint: none"));
}

#[test]
fn reset_removes_checkpoint_and_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    crash_on(&harness, "b.bin", 1);

    assert!(reset_progress(&harness.store()).expect("reset"));
    assert!(!reset_progress(&harness.store()).expect("reset again"));
    assert!(harness.store().load().expect("load").is_none());
}

#[test]
fn phase_history_walks_checkpoint_cycles() {
    let dir = tempdir().expect("tempdir");
    let harness = Harness::new(dir.path());
    let (catalog, fetcher) = abc_catalog();
    let mut runner = harness.runner(catalog, fetcher, chunked(2));

    runner.run().expect("run");

    assert_eq!(
        runner.phase_history(),
        &[
            RunPhase::Idle,
            RunPhase::Resuming,
            RunPhase::Processing,
            RunPhase::Checkpointing,
            RunPhase::Processing,
            RunPhase::Checkpointing,
            RunPhase::Processing,
            RunPhase::Finalizing,
            RunPhase::Done,
        ]
    );
}
