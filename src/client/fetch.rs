use super::{ContentFetcher, FetchError, FetchedContent};
use crate::catalog::SourceRef;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Reads at most `max_bytes` from `reader`; hitting the ceiling truncates rather than fails.
pub fn read_bounded<R: Read>(reader: R, max_bytes: u64) -> std::io::Result<FetchedContent> {
    let mut bytes = Vec::new();
    reader.take(max_bytes.saturating_add(1)).read_to_end(&mut bytes)?;
    let truncated = bytes.len() as u64 > max_bytes;
    if truncated {
        bytes.truncate(max_bytes as usize);
    }
    Ok(FetchedContent { bytes, truncated })
}

/// Fetches objects over HTTP as `{base}/{container}/{path}`.
#[derive(Debug, Clone)]
pub struct ObjectStoreFetcher {
    base: String,
    agent: ureq::Agent,
}

impl ObjectStoreFetcher {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base: base.into(),
            agent,
        }
    }

    pub fn object_url(&self, source: &SourceRef) -> String {
        let path = source
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}",
            self.base.trim_end_matches('/'),
            urlencoding::encode(&source.container),
            path
        )
    }
}

impl ContentFetcher for ObjectStoreFetcher {
    fn fetch(&self, source: &SourceRef, max_bytes: u64) -> Result<FetchedContent, FetchError> {
        let url = self.object_url(source);
        let response = self.agent.get(&url).call().map_err(|err| match err {
            ureq::Error::Status(status, _) => FetchError::Http {
                url: url.clone(),
                status,
            },
            ureq::Error::Transport(transport) => FetchError::Transport {
                url: url.clone(),
                reason: transport.to_string(),
            },
        })?;
        read_bounded(response.into_reader(), max_bytes).map_err(|err| FetchError::Transport {
            url,
            reason: err.to_string(),
        })
    }
}

/// Fetches objects from a locally mounted copy of the store: `{root}/{container}/{path}`.
#[derive(Debug, Clone)]
pub struct LocalDirFetcher {
    root: PathBuf,
}

impl LocalDirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, source: &SourceRef) -> Result<PathBuf, FetchError> {
        let relative = Path::new(&source.container).join(&source.path);
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if escapes {
            return Err(FetchError::InvalidPath {
                path: relative.display().to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl ContentFetcher for LocalDirFetcher {
    fn fetch(&self, source: &SourceRef, max_bytes: u64) -> Result<FetchedContent, FetchError> {
        let path = self.object_path(source)?;
        let file = fs::File::open(&path).map_err(|err| FetchError::Io {
            path: path.display().to_string(),
            source: err,
        })?;
        read_bounded(file, max_bytes).map_err(|err| FetchError::Io {
            path: path.display().to_string(),
            source: err,
        })
    }
}
