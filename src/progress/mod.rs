use crate::catalog::WorkItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod store;

pub use store::ProgressStore;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("checkpoint {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("checkpoint {path} has schema version {found}, expected {expected}")]
    SchemaMismatch {
        path: String,
        found: u64,
        expected: u32,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode checkpoint {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Terminal outcome of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ResultStatus {
    Succeeded,
    Skipped(String),
    Failed(String),
}

impl ResultStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Succeeded => None,
            Self::Skipped(reason) | Self::Failed(reason) => Some(reason.as_str()),
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}({reason})", self.label()),
            None => write!(f, "{}", self.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedResult {
    pub display_name: String,
    pub directory_path: String,
    #[serde(default)]
    pub output_text: String,
    pub status: ResultStatus,
}

impl ProcessedResult {
    pub fn succeeded(item: &WorkItem, output_text: impl Into<String>) -> Self {
        Self::with_status(item, output_text.into(), ResultStatus::Succeeded)
    }

    pub fn skipped(item: &WorkItem, reason: impl Into<String>) -> Self {
        Self::with_status(item, String::new(), ResultStatus::Skipped(reason.into()))
    }

    pub fn failed(item: &WorkItem, reason: impl Into<String>) -> Self {
        Self::with_status(item, String::new(), ResultStatus::Failed(reason.into()))
    }

    fn with_status(item: &WorkItem, output_text: String, status: ResultStatus) -> Self {
        Self {
            display_name: item.display_name.clone(),
            directory_path: item.directory_path.clone(),
            output_text,
            status,
        }
    }
}

/// Durable prefix of a run: `results[i]` belongs to catalog item `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub schema_version: u32,
    pub source_identity: String,
    #[serde(default)]
    pub catalog_fingerprint: Option<String>,
    pub results: Vec<ProcessedResult>,
    pub last_processed_index: usize,
    pub saved_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    pub fn new(
        source_identity: impl Into<String>,
        catalog_fingerprint: Option<String>,
        results: Vec<ProcessedResult>,
        saved_at: DateTime<Utc>,
    ) -> Self {
        let last_processed_index = results.len();
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            source_identity: source_identity.into(),
            catalog_fingerprint,
            results,
            last_processed_index,
            saved_at,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.last_processed_index == self.results.len()
    }

    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.results)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn tally(results: &[ProcessedResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            match result.status {
                ResultStatus::Succeeded => counts.succeeded += 1,
                ResultStatus::Skipped(_) => counts.skipped += 1,
                ResultStatus::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }
}
