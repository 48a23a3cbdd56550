use super::{ProgressError, ProgressSnapshot, SNAPSHOT_SCHEMA_VERSION};
use crate::shared::fs_atomic::{atomic_write_file, remove_file_if_exists};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-backed checkpoint. One writer per run; readers only between runs.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl Into<String>) -> ProgressError {
        ProgressError::Corrupt {
            path: self.path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// `Ok(None)` when no checkpoint exists. A present but unusable file is always an error.
    pub fn load(&self) -> Result<Option<ProgressSnapshot>, ProgressError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ProgressError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        let value: Value = serde_json::from_str(&raw).map_err(|e| self.corrupt(e.to_string()))?;
        let version = value
            .get("schemaVersion")
            .and_then(Value::as_u64)
            .ok_or_else(|| self.corrupt("missing `schemaVersion`"))?;
        if version != u64::from(SNAPSHOT_SCHEMA_VERSION) {
            return Err(ProgressError::SchemaMismatch {
                path: self.path.display().to_string(),
                found: version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }

        let snapshot: ProgressSnapshot =
            serde_json::from_value(value).map_err(|e| self.corrupt(e.to_string()))?;
        if !snapshot.is_consistent() {
            return Err(self.corrupt(format!(
                "lastProcessedIndex {} does not match {} stored results",
                snapshot.last_processed_index,
                snapshot.results.len()
            )));
        }
        Ok(Some(snapshot))
    }

    /// Replaces the checkpoint atomically.
    pub fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), ProgressError> {
        if !snapshot.is_consistent() {
            return Err(self.corrupt(format!(
                "refusing to save lastProcessedIndex {} with {} results",
                snapshot.last_processed_index,
                snapshot.results.len()
            )));
        }
        let body = serde_json::to_vec_pretty(snapshot).map_err(|source| ProgressError::Encode {
            path: self.path.display().to_string(),
            source,
        })?;
        atomic_write_file(&self.path, &body).map_err(|source| ProgressError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Deletes the checkpoint; absent is fine.
    pub fn clear(&self) -> Result<(), ProgressError> {
        remove_file_if_exists(&self.path)
            .map(|_| ())
            .map_err(|source| ProgressError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
