use crate::catalog::TableCatalog;
use crate::config::{load_settings, ConfigError, Settings, StatePaths};
use crate::progress::ProgressStore;
use crate::shared::logging::RunLog;

use super::cli::CliArgs;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

/// Settings from file and environment, with command-line overrides applied last.
pub fn load_cli_settings(args: &CliArgs) -> Result<Settings, String> {
    let mut settings = load_settings(args.config.as_deref()).map_err(map_config_err)?;
    if let Some(catalog) = &args.catalog {
        settings.catalog_path = Some(catalog.clone());
    }
    Ok(settings)
}

pub fn state_paths(settings: &Settings) -> Result<StatePaths, String> {
    settings.state_paths().map_err(map_config_err)
}

pub fn progress_store(paths: &StatePaths) -> ProgressStore {
    ProgressStore::new(paths.checkpoint_path())
}

pub fn run_log(paths: &StatePaths) -> RunLog {
    RunLog::new(paths.run_log_path())
}

pub fn optional_catalog(settings: &Settings) -> Option<TableCatalog> {
    settings.catalog_path.as_ref().map(TableCatalog::open)
}
