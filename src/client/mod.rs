use crate::catalog::{SourceRef, WorkItem};
use crate::config::Settings;
use crate::progress::ProcessedResult;
use crate::shared::logging::RunLog;
use std::sync::Arc;
use std::time::Duration;

pub mod classify;
pub mod fetch;
pub mod generate;
pub mod retry;

pub use classify::{classify_content, non_printable_ratio, ContentClass, BINARY_THRESHOLD};
pub use fetch::{LocalDirFetcher, ObjectStoreFetcher};
pub use generate::{call_with_deadline, ChatCompletionsGenerator};
pub use retry::{FailureClass, Pacer, RecordingPacer, RetryPolicy, ThreadPacer};

pub const SKIP_UNREADABLE: &str = "unreadable";
pub const SKIP_EMPTY: &str = "empty";
pub const FAILED_AFTER_RETRIES: &str = "api failure after retries";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("object store returned HTTP {status} for {url}")]
    Http { url: String, status: u16 },
    #[error("object store request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("object path `{path}` escapes the content root")]
    InvalidPath { path: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limited: {message}")]
    RateLimited { message: String },
    #[error("generation request failed: {message}")]
    Http { status: u16, message: String },
    #[error("generation transport error: {0}")]
    Transport(String),
    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
    #[error("generation call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

/// Retrieves raw object content, reading no more than `max_bytes`.
pub trait ContentFetcher {
    fn fetch(&self, source: &SourceRef, max_bytes: u64) -> Result<FetchedContent, FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub display_name: String,
    pub directory_path: String,
    pub text: String,
}

/// One remote text-generation call. Timeouts are applied by the caller.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientLimits {
    pub max_content_bytes: u64,
    pub max_input_chars: usize,
    pub request_timeout: Duration,
}

impl ClientLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_content_bytes: settings.max_content_bytes,
            max_input_chars: settings.max_input_chars,
            request_timeout: settings.request_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub result: ProcessedResult,
    /// True when at least one generation attempt was issued for the item.
    pub remote_called: bool,
    pub attempts: u32,
}

/// Turns one work item into exactly one [`ProcessedResult`], never an error.
pub struct RateLimitedClient {
    fetcher: Box<dyn ContentFetcher>,
    generator: Arc<dyn TextGenerator>,
    pacer: Arc<dyn Pacer>,
    policy: RetryPolicy,
    limits: ClientLimits,
    log: RunLog,
}

impl RateLimitedClient {
    pub fn new(
        fetcher: Box<dyn ContentFetcher>,
        generator: Arc<dyn TextGenerator>,
        pacer: Arc<dyn Pacer>,
        policy: RetryPolicy,
        limits: ClientLimits,
    ) -> Self {
        Self {
            fetcher,
            generator,
            pacer,
            policy,
            limits,
            log: RunLog::disabled(),
        }
    }

    pub fn with_log(mut self, log: RunLog) -> Self {
        self.log = log;
        self
    }

    pub fn pacer(&self) -> &Arc<dyn Pacer> {
        &self.pacer
    }

    pub fn process(&self, item: &WorkItem) -> ItemOutcome {
        let content = match self
            .fetcher
            .fetch(&item.source_ref, self.limits.max_content_bytes)
        {
            Ok(content) => content,
            Err(err) => {
                return ItemOutcome {
                    result: ProcessedResult::failed(item, format!("content unavailable: {err}")),
                    remote_called: false,
                    attempts: 0,
                }
            }
        };
        if content.truncated {
            self.log.info(
                "content.truncated",
                &format!(
                    "{} truncated to {} bytes",
                    item.source_ref.path, self.limits.max_content_bytes
                ),
            );
        }

        match classify_content(&content.bytes) {
            ContentClass::Empty => {
                return ItemOutcome {
                    result: ProcessedResult::skipped(item, SKIP_EMPTY),
                    remote_called: false,
                    attempts: 0,
                }
            }
            ContentClass::Binary => {
                return ItemOutcome {
                    result: ProcessedResult::skipped(item, SKIP_UNREADABLE),
                    remote_called: false,
                    attempts: 0,
                }
            }
            ContentClass::Text => {}
        }

        let text = String::from_utf8_lossy(&content.bytes);
        let request = GenerationRequest {
            display_name: item.display_name.clone(),
            directory_path: item.directory_path.clone(),
            text: classify::truncate_chars(&text, self.limits.max_input_chars).to_string(),
        };
        let (outcome, attempts) = self.generate_with_retry(&request);
        let result = match outcome {
            Some(output) => ProcessedResult::succeeded(item, output),
            None => ProcessedResult::failed(item, FAILED_AFTER_RETRIES),
        };
        ItemOutcome {
            result,
            remote_called: true,
            attempts,
        }
    }

    fn generate_with_retry(&self, request: &GenerationRequest) -> (Option<String>, u32) {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let generator = Arc::clone(&self.generator);
            let owned = request.clone();
            let result =
                call_with_deadline(self.limits.request_timeout, move || generator.generate(&owned));

            let err = match result {
                Ok(output) => return (Some(output), attempt),
                Err(err) => err,
            };

            if attempt == max_attempts {
                self.log.error(
                    "generation.exhausted",
                    &format!(
                        "{} failed after {attempt} attempts: {err}",
                        request.display_name
                    ),
                );
                break;
            }
            let wait = self.policy.delay_after(err.class(), attempt);
            self.log.warn(
                "generation.retry",
                &format!(
                    "{} attempt {attempt}/{max_attempts} failed ({:?}): {err}; waiting {}s",
                    request.display_name,
                    err.class(),
                    wait.as_secs()
                ),
            );
            self.pacer.pause(wait);
        }
        (None, max_attempts)
    }
}
