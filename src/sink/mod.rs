use crate::progress::{ProcessedResult, ProgressError, ProgressStore, ResultStatus};
use crate::shared::fs_atomic::atomic_write_file;
use std::path::{Path, PathBuf};

pub const ARTIFACT_HEADER: [&str; 3] = ["displayName", "directoryPath", "outputText"];

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact written to {path} but checkpoint could not be cleared: {source}")]
    ClearCheckpoint {
        path: String,
        #[source]
        source: ProgressError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRow {
    pub display_name: String,
    pub directory_path: String,
    pub output_text: String,
}

/// Final tabular output, one row per catalog item in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalArtifact {
    pub rows: Vec<ArtifactRow>,
}

impl FinalArtifact {
    pub fn build(results: &[ProcessedResult]) -> Self {
        let rows = results
            .iter()
            .map(|result| ArtifactRow {
                display_name: result.display_name.clone(),
                directory_path: result.directory_path.clone(),
                output_text: match &result.status {
                    ResultStatus::Succeeded => result.output_text.clone(),
                    ResultStatus::Skipped(reason) => format!("[skipped: {reason}]"),
                    ResultStatus::Failed(reason) => format!("[failed: {reason}]"),
                },
            })
            .collect();
        Self { rows }
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, &ARTIFACT_HEADER);
        for row in &self.rows {
            push_record(
                &mut out,
                &[
                    row.display_name.as_str(),
                    row.directory_path.as_str(),
                    row.output_text.as_str(),
                ],
            );
        }
        out
    }
}

fn push_record(out: &mut String, fields: &[&str]) {
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}

fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "catalog".to_string()
    } else {
        cleaned
    }
}

/// Writes finished artifacts and retires the checkpoint they supersede.
#[derive(Debug, Clone)]
pub struct ResultSink {
    output_dir: PathBuf,
}

impl ResultSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn artifact_path(&self, source_identity: &str) -> PathBuf {
        self.output_dir
            .join(format!("digest-{}.csv", sanitize_component(source_identity)))
    }

    pub fn build(&self, results: &[ProcessedResult]) -> FinalArtifact {
        FinalArtifact::build(results)
    }

    /// Single atomic write of the whole artifact, tagged with the catalog identity.
    pub fn persist(
        &self,
        artifact: &FinalArtifact,
        source_identity: &str,
    ) -> Result<PathBuf, SinkError> {
        let path = self.artifact_path(source_identity);
        atomic_write_file(&path, artifact.to_csv().as_bytes()).map_err(|source| {
            SinkError::Write {
                path: path.display().to_string(),
                source,
            }
        })?;
        Ok(path)
    }

    /// Builds and persists the artifact, then clears `store`. The checkpoint survives any failure.
    pub fn commit(
        &self,
        results: &[ProcessedResult],
        source_identity: &str,
        store: &ProgressStore,
    ) -> Result<PathBuf, SinkError> {
        let artifact = self.build(results);
        let path = self.persist(&artifact, source_identity)?;
        store
            .clear()
            .map_err(|source| SinkError::ClearCheckpoint {
                path: path.display().to_string(),
                source,
            })?;
        Ok(path)
    }
}
