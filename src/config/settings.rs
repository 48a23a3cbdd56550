use super::{default_state_dir, ConfigError, StatePaths};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_chunk_size() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_item_delay_secs() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_rate_limit_backoff_secs() -> u64 {
    10
}

fn default_retry_backoff_secs() -> u64 {
    5
}

fn default_max_content_bytes() -> u64 {
    1024 * 1024
}

fn default_max_input_chars() -> usize {
    12_000
}

/// Process-wide configuration, built once at startup and passed into each component.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_key: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub object_store_base: Option<String>,
    pub content_root: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_item_delay_secs")]
    pub item_delay_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            object_store_base: None,
            content_root: None,
            catalog_path: None,
            state_dir: None,
            output_dir: None,
            chunk_size: default_chunk_size(),
            max_attempts: default_max_attempts(),
            item_delay_secs: default_item_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            max_content_bytes: default_max_content_bytes(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlays `BULKDIGEST_*` values returned by `lookup`; blank values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BULKDIGEST_API_KEY") {
            self.api_key = Some(v.trim().to_string());
        }
        if let Some(v) = get("BULKDIGEST_API_BASE") {
            self.api_base = v.trim().to_string();
        }
        if let Some(v) = get("BULKDIGEST_MODEL") {
            self.model = v.trim().to_string();
        }
        if let Some(v) = get("BULKDIGEST_OBJECT_STORE_BASE") {
            self.object_store_base = Some(v.trim().to_string());
        }
        if let Some(v) = get("BULKDIGEST_CONTENT_ROOT") {
            self.content_root = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("BULKDIGEST_CATALOG") {
            self.catalog_path = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("BULKDIGEST_STATE_DIR") {
            self.state_dir = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("BULKDIGEST_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("BULKDIGEST_CHUNK_SIZE") {
            self.chunk_size = parse_number("BULKDIGEST_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("BULKDIGEST_MAX_ATTEMPTS") {
            self.max_attempts = parse_number("BULKDIGEST_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("BULKDIGEST_ITEM_DELAY_SECS") {
            self.item_delay_secs = parse_number("BULKDIGEST_ITEM_DELAY_SECS", &v)?;
        }
        if let Some(v) = get("BULKDIGEST_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("BULKDIGEST_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("BULKDIGEST_MAX_CONTENT_BYTES") {
            self.max_content_bytes = parse_number("BULKDIGEST_MAX_CONTENT_BYTES", &v)?;
        }
        if let Some(v) = get("BULKDIGEST_MAX_INPUT_CHARS") {
            self.max_input_chars = parse_number("BULKDIGEST_MAX_INPUT_CHARS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Settings("`chunk_size` must be >= 1".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Settings(
                "`max_attempts` must be >= 1".to_string(),
            ));
        }
        if self.max_content_bytes == 0 {
            return Err(ConfigError::Settings(
                "`max_content_bytes` must be >= 1".to_string(),
            ));
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::Settings(
                "`max_input_chars` must be >= 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Settings(
                "`request_timeout_secs` must be >= 1".to_string(),
            ));
        }
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::Settings("`api_base` must be non-empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Settings("`model` must be non-empty".to_string()));
        }
        Ok(())
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingCredentials)
    }

    pub fn require_catalog_path(&self) -> Result<&Path, ConfigError> {
        self.catalog_path
            .as_deref()
            .ok_or(ConfigError::MissingCatalog)
    }

    pub fn state_paths(&self) -> Result<StatePaths, ConfigError> {
        match &self.state_dir {
            Some(dir) => Ok(StatePaths::new(dir.clone())),
            None => Ok(StatePaths::new(default_state_dir()?)),
        }
    }

    pub fn resolved_output_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.state_paths()?.default_output_dir()),
        }
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_secs(self.item_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: err.to_string(),
        })
}
