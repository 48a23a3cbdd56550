use crate::app::cli::CliArgs;
use crate::app::command_support::{
    load_cli_settings, optional_catalog, progress_store, state_paths,
};
use crate::batch::{query_status, reset_progress};
use crate::catalog::WorkCatalog;

pub fn cmd_status(args: &CliArgs) -> Result<String, String> {
    let settings = load_cli_settings(args)?;
    let paths = state_paths(&settings)?;
    let store = progress_store(&paths);
    let catalog = optional_catalog(&settings);

    let report = query_status(
        catalog.as_ref().map(|c| c as &dyn WorkCatalog),
        &store,
        settings.item_delay(),
    )
    .map_err(|e| e.to_string())?;
    Ok(report.render())
}

pub fn cmd_clean(args: &CliArgs) -> Result<String, String> {
    let settings = load_cli_settings(args)?;
    let paths = state_paths(&settings)?;
    let store = progress_store(&paths);
    let removed = reset_progress(&store).map_err(|e| e.to_string())?;
    if removed {
        Ok(format!("checkpoint removed: {}", store.path().display()))
    } else {
        Ok(format!("no checkpoint at {}", store.path().display()))
    }
}
