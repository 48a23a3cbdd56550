use super::GenerationError;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    Other,
}

impl GenerationError {
    pub fn class(&self) -> FailureClass {
        match self {
            GenerationError::RateLimited { .. } => FailureClass::RateLimited,
            _ => FailureClass::Other,
        }
    }
}

/// Attempt budget and backoff schedule for the generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub rate_limit_step: Duration,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_step: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            rate_limit_step: Duration::from_secs(settings.rate_limit_backoff_secs),
            retry_delay: Duration::from_secs(settings.retry_backoff_secs),
        }
    }

    /// Wait before the attempt that follows failed attempt `attempt` (1-based).
    pub fn delay_after(&self, class: FailureClass, attempt: u32) -> Duration {
        match class {
            FailureClass::RateLimited => self.rate_limit_step.saturating_mul(attempt),
            FailureClass::Other => self.retry_delay,
        }
    }
}

/// Source of every deliberate wait in a run: retry backoff and inter-item pacing.
pub trait Pacer: Send + Sync {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .map(|pauses| pauses.clone())
            .unwrap_or_default()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}
