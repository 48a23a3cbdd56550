use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod identity;
pub mod table;

pub use identity::source_identity_from_path;
pub use table::TableCatalog;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },
    #[error("catalog malformed at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub container: String,
    pub path: String,
}

/// One object to process. Position in the catalog is its checkpoint index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub source_ref: SourceRef,
    pub display_name: String,
    pub directory_path: String,
    pub size_bytes: u64,
}

impl WorkItem {
    /// Builds an item from a storage listing row; display and directory names derive from `path`.
    pub fn from_object(container: &str, path: &str, size_bytes: u64) -> Result<Self, String> {
        let container = container.trim();
        let path = path.trim().trim_start_matches('/');
        if container.is_empty() {
            return Err("container must be non-empty".to_string());
        }
        if path.is_empty() || path.ends_with('/') {
            return Err(format!("path `{path}` does not name an object"));
        }

        let (parent, name) = match path.rsplit_once('/') {
            Some((parent, name)) => (Some(parent), name),
            None => (None, path),
        };
        let directory_path = match parent {
            Some(parent) => format!("{container}/{parent}"),
            None => container.to_string(),
        };

        Ok(Self {
            source_ref: SourceRef {
                container: container.to_string(),
                path: path.to_string(),
            },
            display_name: name.to_string(),
            directory_path,
            size_bytes,
        })
    }
}

/// Read-only ordered listing of the objects a run must process.
pub trait WorkCatalog {
    /// Version marker that ties checkpoints to this listing.
    fn source_identity(&self) -> &str;

    /// Full ordered listing. Any error is fatal for the run.
    fn list(&self) -> Result<Vec<WorkItem>, CatalogError>;
}

/// In-memory catalog for callers that already hold the listing.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    identity: String,
    items: Vec<WorkItem>,
}

impl StaticCatalog {
    pub fn new(identity: impl Into<String>, items: Vec<WorkItem>) -> Self {
        Self {
            identity: identity.into(),
            items,
        }
    }
}

impl WorkCatalog for StaticCatalog {
    fn source_identity(&self) -> &str {
        &self.identity
    }

    fn list(&self) -> Result<Vec<WorkItem>, CatalogError> {
        Ok(self.items.clone())
    }
}

/// SHA-256 over the ordered (container, path, size) triples of `items`.
pub fn catalog_fingerprint(items: &[WorkItem]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.source_ref.container.as_bytes());
        hasher.update([0]);
        hasher.update(item.source_ref.path.as_bytes());
        hasher.update([0]);
        hasher.update(item.size_bytes.to_le_bytes());
        hasher.update([0xff]);
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
