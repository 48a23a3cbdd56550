use crate::app::cli::CliArgs;
use crate::app::command_support::{load_cli_settings, progress_store, run_log, state_paths};
use crate::batch::{BatchError, BatchRunner, ResumeMode, RunOptions};
use crate::catalog::TableCatalog;
use crate::client::{
    ChatCompletionsGenerator, ClientLimits, ContentFetcher, LocalDirFetcher, ObjectStoreFetcher,
    RateLimitedClient, RetryPolicy, ThreadPacer,
};
use crate::config::{ConfigError, Settings};
use crate::sink::ResultSink;
use std::fs;
use std::sync::Arc;

pub fn cmd_run(args: &CliArgs) -> Result<String, String> {
    let mode = if args.fresh {
        ResumeMode::Fresh
    } else {
        ResumeMode::Auto
    };
    execute(args, mode)
}

pub fn cmd_resume(args: &CliArgs) -> Result<String, String> {
    execute(args, ResumeMode::Auto)
}

pub fn cmd_stop(args: &CliArgs) -> Result<String, String> {
    let settings = load_cli_settings(args)?;
    let path = state_paths(&settings)?.stop_signal_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
    }
    fs::write(&path, b"stop\n").map_err(|e| format!("failed to write {}: {e}", path.display()))?;
    Ok(format!("stop requested: {}", path.display()))
}

fn execute(args: &CliArgs, mode: ResumeMode) -> Result<String, String> {
    let settings = load_cli_settings(args)?;
    let mut runner = build_runner(&settings, mode).map_err(|e| e.to_string())?;
    let report = runner.run().map_err(|e| e.to_string())?;
    Ok(report.render())
}

fn content_fetcher(settings: &Settings) -> Result<Box<dyn ContentFetcher>, ConfigError> {
    match (&settings.object_store_base, &settings.content_root) {
        (Some(base), _) => Ok(Box::new(ObjectStoreFetcher::new(
            base.clone(),
            settings.request_timeout(),
        ))),
        (None, Some(root)) => Ok(Box::new(LocalDirFetcher::new(root.clone()))),
        (None, None) => Err(ConfigError::Settings(
            "configure `object_store_base` or `content_root` to fetch catalog objects".to_string(),
        )),
    }
}

/// Wires every collaborator from `settings`; credentials are checked before anything runs.
pub fn build_runner(settings: &Settings, mode: ResumeMode) -> Result<BatchRunner, BatchError> {
    let api_key = settings.require_api_key()?;
    let catalog_path = settings.require_catalog_path()?;
    let fetcher = content_fetcher(settings)?;
    let paths = settings.state_paths()?;
    let log = run_log(&paths);

    let generator = Arc::new(ChatCompletionsGenerator::new(
        settings.api_base.clone(),
        api_key,
        settings.model.clone(),
        settings.request_timeout(),
    ));
    let client = RateLimitedClient::new(
        fetcher,
        generator,
        Arc::new(ThreadPacer),
        RetryPolicy::from_settings(settings),
        ClientLimits::from_settings(settings),
    )
    .with_log(log.clone());

    let options = RunOptions::from_settings(settings, mode)?;

    Ok(BatchRunner::new(
        Box::new(TableCatalog::open(catalog_path)),
        progress_store(&paths),
        client,
        ResultSink::new(settings.resolved_output_dir()?),
        options,
    )
    .with_log(log))
}
