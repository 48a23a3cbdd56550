use super::{BatchError, RunPhase};
use crate::catalog::{catalog_fingerprint, WorkCatalog, WorkItem};
use crate::client::RateLimitedClient;
use crate::config::Settings;
use crate::progress::{ProcessedResult, ProgressSnapshot, ProgressStore, StatusCounts};
use crate::shared::fs_atomic::remove_file_if_exists;
use crate::shared::logging::RunLog;
use crate::sink::ResultSink;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeMode {
    /// Continue from a matching checkpoint when one exists.
    #[default]
    Auto,
    /// Discard any checkpoint and start at the first item.
    Fresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub chunk_size: usize,
    pub item_delay: Duration,
    pub resume: ResumeMode,
    pub stop_signal: Option<PathBuf>,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings, resume: ResumeMode) -> Result<Self, BatchError> {
        Ok(Self {
            chunk_size: settings.chunk_size,
            item_delay: settings.item_delay(),
            resume,
            stop_signal: Some(settings.state_paths()?.stop_signal_path()),
        })
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            item_delay: Duration::from_secs(3),
            resume: ResumeMode::Auto,
            stop_signal: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { artifact: PathBuf },
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub source_identity: String,
    pub total: usize,
    pub resumed_from: usize,
    pub processed_now: usize,
    pub counts: StatusCounts,
    pub checkpoints_written: usize,
    pub checkpoint_failures: usize,
}

impl RunReport {
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("catalog: {}", self.source_identity),
            format!(
                "items: {} total, {} resumed from checkpoint, {} processed this run",
                self.total, self.resumed_from, self.processed_now
            ),
            format!(
                "results: {} succeeded, {} skipped, {} failed",
                self.counts.succeeded, self.counts.skipped, self.counts.failed
            ),
            format!(
                "checkpoints: {} written, {} failed",
                self.checkpoints_written, self.checkpoint_failures
            ),
        ];
        match &self.outcome {
            RunOutcome::Completed { artifact } => {
                lines.push(format!("artifact: {}", artifact.display()))
            }
            RunOutcome::Interrupted => {
                lines.push("interrupted: progress saved, run `resume` to continue".to_string())
            }
        }
        lines.join("\n")
    }
}

/// Drives a catalog through the client, checkpointing every `chunk_size` new results.
///
/// Only catalog and checkpoint problems detected before the first item are fatal. Per-item
/// failures become `Failed` results, and a failed checkpoint write is logged and retried at the
/// next chunk boundary. A stop file present when the run starts is stale and gets removed.
pub struct BatchRunner {
    catalog: Box<dyn WorkCatalog>,
    store: ProgressStore,
    client: RateLimitedClient,
    sink: ResultSink,
    options: RunOptions,
    log: RunLog,
    phase: RunPhase,
    history: Vec<RunPhase>,
}

struct ChunkState {
    unsaved: usize,
    /// Results since the last save attempt, successful or not.
    since_attempt: usize,
    written: usize,
    failures: usize,
}

impl BatchRunner {
    pub fn new(
        catalog: Box<dyn WorkCatalog>,
        store: ProgressStore,
        client: RateLimitedClient,
        sink: ResultSink,
        options: RunOptions,
    ) -> Self {
        Self {
            catalog,
            store,
            client,
            sink,
            options,
            log: RunLog::disabled(),
            phase: RunPhase::Idle,
            history: vec![RunPhase::Idle],
        }
    }

    pub fn with_log(mut self, log: RunLog) -> Self {
        self.log = log;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Every phase entered so far, starting with `Idle`.
    pub fn phase_history(&self) -> &[RunPhase] {
        &self.history
    }

    fn transition(&mut self, next: RunPhase) -> Result<(), BatchError> {
        if !self.phase.can_transition_to(next) {
            return Err(BatchError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.log
            .info("run.phase", &format!("{} -> {}", self.phase, next));
        self.phase = next;
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self, err: BatchError) -> BatchError {
        self.log.error("run.failed", &err.to_string());
        if self.phase.can_transition_to(RunPhase::Failed) {
            self.phase = RunPhase::Failed;
            self.history.push(RunPhase::Failed);
        }
        err
    }

    pub fn run(&mut self) -> Result<RunReport, BatchError> {
        self.transition(RunPhase::Resuming)?;
        if self.stop_requested() {
            self.log.warn(
                "run.stop_signal",
                "removing stop request left over from an earlier invocation",
            );
            self.acknowledge_stop();
        }

        let items = match self.catalog.list() {
            Ok(items) => items,
            Err(err) => return Err(self.fail(err.into())),
        };
        let identity = self.catalog.source_identity().to_string();
        let fingerprint = catalog_fingerprint(&items);

        let seeded = match self.resume_point(&identity, &fingerprint, items.len()) {
            Ok(seeded) => seeded,
            Err(err) => return Err(self.fail(err)),
        };
        let resumed_from = seeded.len();
        let mut snapshot = ProgressSnapshot::new(identity.clone(), Some(fingerprint), seeded, Utc::now());

        self.transition(RunPhase::Processing)?;
        self.log.info(
            "run.start",
            &format!(
                "catalog {identity}: {} items, resuming at {resumed_from}",
                items.len()
            ),
        );

        let mut chunk = ChunkState {
            unsaved: 0,
            since_attempt: 0,
            written: 0,
            failures: 0,
        };
        let total = items.len();

        for (index, item) in items.iter().enumerate().skip(resumed_from) {
            if self.stop_requested() {
                self.checkpoint_if_dirty(&mut snapshot, &mut chunk)?;
                self.acknowledge_stop();
                self.transition(RunPhase::Interrupted)?;
                self.log.warn(
                    "run.interrupted",
                    &format!("stopped before item {index} of {total}"),
                );
                return Ok(self.report(
                    RunOutcome::Interrupted,
                    &snapshot,
                    total,
                    resumed_from,
                    &chunk,
                ));
            }

            let outcome = self.client.process(item);
            self.log_item(index, item, &outcome.result);
            push_result(&mut snapshot, outcome.result);
            chunk.unsaved += 1;
            chunk.since_attempt += 1;

            if chunk.since_attempt >= self.options.chunk_size {
                self.transition(RunPhase::Checkpointing)?;
                self.save_checkpoint(&mut snapshot, &mut chunk);
                self.transition(RunPhase::Processing)?;
            }

            if outcome.remote_called && index + 1 < total {
                self.client.pacer().pause(self.options.item_delay);
            }
        }

        self.checkpoint_if_dirty(&mut snapshot, &mut chunk)?;
        self.transition(RunPhase::Finalizing)?;

        let artifact = match self.sink.commit(&snapshot.results, &identity, &self.store) {
            Ok(path) => path,
            Err(err) => return Err(self.fail(err.into())),
        };
        self.log.info(
            "artifact.persisted",
            &format!("{} rows written to {}", snapshot.results.len(), artifact.display()),
        );
        self.transition(RunPhase::Done)?;

        Ok(self.report(
            RunOutcome::Completed { artifact },
            &snapshot,
            total,
            resumed_from,
            &chunk,
        ))
    }

    fn resume_point(
        &self,
        identity: &str,
        fingerprint: &str,
        total: usize,
    ) -> Result<Vec<ProcessedResult>, BatchError> {
        if self.options.resume == ResumeMode::Fresh {
            self.store.clear()?;
            self.log
                .info("checkpoint.discarded", "fresh run requested; checkpoint cleared");
            return Ok(Vec::new());
        }

        let Some(snapshot) = self.store.load()? else {
            return Ok(Vec::new());
        };

        if snapshot.source_identity != identity {
            self.log.warn(
                "checkpoint.stale",
                &format!(
                    "checkpoint belongs to catalog `{}`, current catalog is `{identity}`; starting from 0",
                    snapshot.source_identity
                ),
            );
            return Ok(Vec::new());
        }

        if let Some(saved) = snapshot.catalog_fingerprint.as_deref() {
            if saved != fingerprint {
                return Err(BatchError::CatalogDrift {
                    source_identity: identity.to_string(),
                    reason: "item listing differs from the checkpointed listing".to_string(),
                });
            }
        }
        if snapshot.last_processed_index > total {
            return Err(BatchError::CatalogDrift {
                source_identity: identity.to_string(),
                reason: format!(
                    "checkpoint covers {} items but the catalog lists {total}",
                    snapshot.last_processed_index
                ),
            });
        }

        self.log.info(
            "checkpoint.resumed",
            &format!(
                "resuming catalog {identity} at item {} (saved {})",
                snapshot.last_processed_index, snapshot.saved_at
            ),
        );
        Ok(snapshot.results)
    }

    fn checkpoint_if_dirty(
        &mut self,
        snapshot: &mut ProgressSnapshot,
        chunk: &mut ChunkState,
    ) -> Result<(), BatchError> {
        if chunk.unsaved == 0 {
            return Ok(());
        }
        self.transition(RunPhase::Checkpointing)?;
        self.save_checkpoint(snapshot, chunk);
        self.transition(RunPhase::Processing)
    }

    fn save_checkpoint(&self, snapshot: &mut ProgressSnapshot, chunk: &mut ChunkState) {
        snapshot.saved_at = Utc::now();
        chunk.since_attempt = 0;
        match self.store.save(snapshot) {
            Ok(()) => {
                chunk.unsaved = 0;
                chunk.written += 1;
                self.log.info(
                    "checkpoint.saved",
                    &format!("{} results saved", snapshot.last_processed_index),
                );
            }
            Err(err) => {
                chunk.failures += 1;
                self.log.error("checkpoint.save_failed", &err.to_string());
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.options
            .stop_signal
            .as_ref()
            .is_some_and(|path| path.exists())
    }

    fn acknowledge_stop(&self) {
        if let Some(path) = &self.options.stop_signal {
            if let Err(err) = remove_file_if_exists(path) {
                self.log.warn(
                    "run.stop_signal",
                    &format!("failed to remove {}: {err}", path.display()),
                );
            }
        }
    }

    fn log_item(&self, index: usize, item: &WorkItem, result: &ProcessedResult) {
        let event = format!("item.{}", result.status.label());
        let message = format!(
            "[{index}] {}/{}: {}",
            item.source_ref.container, item.source_ref.path, result.status
        );
        self.log.info(&event, &message);
    }

    fn report(
        &self,
        outcome: RunOutcome,
        snapshot: &ProgressSnapshot,
        total: usize,
        resumed_from: usize,
        chunk: &ChunkState,
    ) -> RunReport {
        RunReport {
            outcome,
            source_identity: snapshot.source_identity.clone(),
            total,
            resumed_from,
            processed_now: snapshot.results.len() - resumed_from,
            counts: snapshot.status_counts(),
            checkpoints_written: chunk.written,
            checkpoint_failures: chunk.failures,
        }
    }
}

fn push_result(snapshot: &mut ProgressSnapshot, result: ProcessedResult) {
    snapshot.results.push(result);
    snapshot.last_processed_index = snapshot.results.len();
}
