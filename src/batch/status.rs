use super::BatchError;
use crate::catalog::WorkCatalog;
use crate::progress::{ProgressStore, StatusCounts};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Read-only view of a run's progress. Building one never touches the checkpoint file.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub source_identity: Option<String>,
    pub catalog_error: Option<String>,
    pub checkpoint_identity: Option<String>,
    pub total: Option<usize>,
    pub processed: usize,
    pub remaining: Option<usize>,
    pub counts: StatusCounts,
    pub saved_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub eta: Option<Duration>,
}

/// Reports processed/remaining counts and an ETA of `remaining × item_delay`.
///
/// An unreadable catalog is reported, not raised; only a corrupt checkpoint is an error.
pub fn query_status(
    catalog: Option<&dyn WorkCatalog>,
    store: &ProgressStore,
    item_delay: Duration,
) -> Result<StatusReport, BatchError> {
    let snapshot = store.load()?;

    let (source_identity, listing) = match catalog {
        Some(catalog) => (
            Some(catalog.source_identity().to_string()),
            Some(catalog.list()),
        ),
        None => (None, None),
    };
    let (total, catalog_error) = match listing {
        Some(Ok(items)) => (Some(items.len()), None),
        Some(Err(err)) => (None, Some(err.to_string())),
        None => (None, Some("no catalog configured".to_string())),
    };

    let checkpoint_identity = snapshot.as_ref().map(|s| s.source_identity.clone());
    let stale = match (&source_identity, &checkpoint_identity) {
        (Some(current), Some(saved)) => current != saved,
        _ => false,
    };

    let (processed, counts, saved_at) = match &snapshot {
        Some(snapshot) if !stale => (
            snapshot.last_processed_index,
            snapshot.status_counts(),
            Some(snapshot.saved_at),
        ),
        Some(snapshot) => (0, StatusCounts::default(), Some(snapshot.saved_at)),
        None => (0, StatusCounts::default(), None),
    };

    let remaining = total.map(|total| total.saturating_sub(processed));
    let eta = remaining.map(|remaining| {
        u32::try_from(remaining).map_or(Duration::MAX, |count| item_delay.saturating_mul(count))
    });

    Ok(StatusReport {
        source_identity,
        catalog_error,
        checkpoint_identity,
        total,
        processed,
        remaining,
        counts,
        saved_at,
        stale,
        eta,
    })
}

impl StatusReport {
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        match (&self.source_identity, &self.catalog_error) {
            (Some(identity), None) => lines.push(format!("catalog: {identity}")),
            (Some(identity), Some(err)) => {
                lines.push(format!("catalog: {identity} (unavailable: {err})"))
            }
            (None, Some(err)) => lines.push(format!("catalog: unavailable ({err})")),
            (None, None) => lines.push("catalog: unknown".to_string()),
        }
        match (&self.checkpoint_identity, self.saved_at) {
            (Some(identity), Some(saved_at)) => lines.push(format!(
                "checkpoint: {identity}, saved {}{}",
                saved_at.to_rfc3339(),
                if self.stale { " (stale, will be ignored)" } else { "" }
            )),
            _ => lines.push("checkpoint: none".to_string()),
        }
        match (self.total, self.remaining) {
            (Some(total), Some(remaining)) => lines.push(format!(
                "progress: {}/{total} processed, {remaining} remaining",
                self.processed
            )),
            _ => lines.push(format!("progress: {} processed", self.processed)),
        }
        lines.push(format!(
            "results: {} succeeded, {} skipped, {} failed",
            self.counts.succeeded, self.counts.skipped, self.counts.failed
        ));
        if let Some(eta) = self.eta {
            lines.push(format!("eta: {}", format_eta(eta)));
        }
        lines.join("\n")
    }
}

/// Deletes the checkpoint unconditionally. Returns whether one existed.
pub fn reset_progress(store: &ProgressStore) -> Result<bool, BatchError> {
    let existed = store.exists();
    store.clear()?;
    Ok(existed)
}

pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
