#![allow(dead_code)]

use bulkdigest::catalog::{SourceRef, StaticCatalog, WorkItem};
use bulkdigest::client::{
    ClientLimits, ContentFetcher, FetchError, FetchedContent, GenerationError, GenerationRequest,
    RateLimitedClient, RecordingPacer, RetryPolicy, TextGenerator,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const IDENTITY: &str = "2024-03-15";

pub fn text_bytes(len: usize) -> Vec<u8> {
    b"lorem ipsum dolor sit amet\n"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

pub fn binary_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 8) as u8).collect()
}

pub fn item(path: &str, size: u64) -> WorkItem {
    WorkItem::from_object("docs", path, size).expect("work item")
}

/// A(text, 1KB), B(binary, 2KB), C(text, 500B).
pub fn abc_catalog() -> (StaticCatalog, MapFetcher) {
    let items = vec![
        item("a.txt", 1024),
        item("b.bin", 2048),
        item("c.txt", 500),
    ];
    let fetcher = MapFetcher::default()
        .with_object("a.txt", text_bytes(1024))
        .with_object("b.bin", binary_bytes(2048))
        .with_object("c.txt", text_bytes(500));
    (StaticCatalog::new(IDENTITY, items), fetcher)
}

/// Serves objects from memory keyed by path; can simulate a hard crash on one path.
#[derive(Debug, Clone, Default)]
pub struct MapFetcher {
    objects: BTreeMap<String, Vec<u8>>,
    crash_on: Option<String>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MapFetcher {
    pub fn with_object(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.objects.insert(path.to_string(), bytes);
        self
    }

    pub fn crashing_on(mut self, path: &str) -> Self {
        self.crash_on = Some(path.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().expect("lock").clone()
    }
}

impl ContentFetcher for MapFetcher {
    fn fetch(&self, source: &SourceRef, max_bytes: u64) -> Result<FetchedContent, FetchError> {
        if self.crash_on.as_deref() == Some(source.path.as_str()) {
            panic!("simulated process kill while fetching {}", source.path);
        }
        self.requests
            .lock()
            .expect("lock")
            .push(source.path.clone());
        let bytes = self
            .objects
            .get(&source.path)
            .ok_or_else(|| FetchError::Http {
                url: format!("mem://{}/{}", source.container, source.path),
                status: 404,
            })?;
        let truncated = bytes.len() as u64 > max_bytes;
        let mut bytes = bytes.clone();
        bytes.truncate(max_bytes as usize);
        Ok(FetchedContent { bytes, truncated })
    }
}

/// Succeeds with a deterministic summary, after replaying any scripted failures.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    failures: Mutex<VecDeque<GenerationError>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(failures: Vec<GenerationError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            ..Self::default()
        }
    }

    pub fn sleeping(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }

    pub fn requested_names(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .map(|r| r.display_name.clone())
            .collect()
    }
}

pub fn summary_for(name: &str) -> String {
    format!("summary of {name}")
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().expect("lock").push(request.clone());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(err) = self.failures.lock().expect("lock").pop_front() {
            return Err(err);
        }
        Ok(summary_for(&request.display_name))
    }
}

pub fn rate_limited() -> GenerationError {
    GenerationError::RateLimited {
        message: "HTTP 429: Too Many Requests".to_string(),
    }
}

pub fn server_error() -> GenerationError {
    GenerationError::Http {
        status: 500,
        message: "HTTP 500: upstream".to_string(),
    }
}

pub fn limits() -> ClientLimits {
    ClientLimits {
        max_content_bytes: 64 * 1024,
        max_input_chars: 4_000,
        request_timeout: Duration::from_secs(5),
    }
}

pub fn client(
    fetcher: MapFetcher,
    generator: Arc<ScriptedGenerator>,
    pacer: Arc<RecordingPacer>,
) -> RateLimitedClient {
    RateLimitedClient::new(
        Box::new(fetcher),
        generator,
        pacer,
        RetryPolicy::default(),
        limits(),
    )
}
