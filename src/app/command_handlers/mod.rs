use crate::app::cli::{help_text, parse_cli_args, CliVerb};

pub mod batch;
pub mod progress;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let parsed = parse_cli_args(&args)?;

    match parsed.verb {
        CliVerb::Help => Ok(help_text()),
        CliVerb::Run => batch::cmd_run(&parsed),
        CliVerb::Resume => batch::cmd_resume(&parsed),
        CliVerb::Stop => batch::cmd_stop(&parsed),
        CliVerb::Status => progress::cmd_status(&parsed),
        CliVerb::Clean => progress::cmd_clean(&parsed),
        CliVerb::Unknown => Err(format!("unknown command `{}`", parsed.raw_verb)),
    }
}
