use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Run,
    Resume,
    Status,
    Clean,
    Stop,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "run" => CliVerb::Run,
        "resume" => CliVerb::Resume,
        "status" => CliVerb::Status,
        "clean" => CliVerb::Clean,
        "stop" => CliVerb::Stop,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub verb: CliVerb,
    pub raw_verb: String,
    pub config: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub fresh: bool,
}

pub fn parse_cli_args(args: &[String]) -> Result<CliArgs, String> {
    let Some((first, rest)) = args.split_first() else {
        return Ok(CliArgs {
            verb: CliVerb::Help,
            raw_verb: String::new(),
            config: None,
            catalog: None,
            fresh: false,
        });
    };

    let mut parsed = CliArgs {
        verb: parse_cli_verb(first),
        raw_verb: first.clone(),
        config: None,
        catalog: None,
        fresh: false,
    };

    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "`--config` requires a path".to_string())?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--catalog" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "`--catalog` requires a path".to_string())?;
                parsed.catalog = Some(PathBuf::from(value));
            }
            "--fresh" => parsed.fresh = true,
            other => return Err(format!("unexpected argument `{other}`")),
        }
    }

    if parsed.fresh && parsed.verb != CliVerb::Run {
        return Err("`--fresh` is only valid with `run`".to_string());
    }
    Ok(parsed)
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: bulkdigest <command> [--config <path>] [--catalog <path>]".to_string(),
        String::new(),
        "Commands:".to_string(),
        "  run [--fresh]      Process the catalog, resuming a matching checkpoint unless --fresh"
            .to_string(),
        "  resume             Continue an interrupted run from its checkpoint".to_string(),
        "  status             Show processed/remaining counts and ETA (read-only)".to_string(),
        "  clean              Delete the checkpoint".to_string(),
        "  stop               Ask a running batch to checkpoint and exit before its next item"
            .to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}
