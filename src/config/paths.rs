use crate::config::ConfigError;
use std::path::{Path, PathBuf};

pub const GLOBAL_STATE_DIR: &str = ".bulkdigest";
pub const GLOBAL_SETTINGS_FILE_NAME: &str = "config.yaml";

pub fn default_state_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(GLOBAL_STATE_DIR))
}

pub fn default_global_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_state_dir()?.join(GLOBAL_SETTINGS_FILE_NAME))
}

/// Files the runner owns under its state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join("progress/checkpoint.json")
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.root.join("logs/run.log")
    }

    pub fn stop_signal_path(&self) -> PathBuf {
        self.root.join("stop")
    }

    pub fn default_output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
