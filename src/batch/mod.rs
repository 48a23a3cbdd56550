use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::progress::ProgressError;
use crate::sink::SinkError;

pub mod phase;
pub mod runner;
pub mod status;

pub use phase::RunPhase;
pub use runner::{BatchRunner, ResumeMode, RunOptions, RunOutcome, RunReport};
pub use status::{format_eta, query_status, reset_progress, StatusReport};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("catalog `{source_identity}` changed since it was checkpointed: {reason}; run `clean` or `run --fresh` to start over")]
    CatalogDrift {
        source_identity: String,
        reason: String,
    },
    #[error("batch run state transition `{from}` -> `{to}` is invalid")]
    InvalidTransition { from: RunPhase, to: RunPhase },
}
