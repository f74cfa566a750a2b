mod cmd_send;
mod exit_code;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use waka_core::{Category, EntityType};

#[derive(Parser, Debug)]
#[command(
    name = "waka",
    version,
    about = "Send a coding activity heartbeat, with redaction and persistent backoff"
)]
pub(crate) struct Cli {
    /// File path, app name or domain the heartbeat is about
    #[arg(long)]
    entity: String,
    #[arg(long, default_value = "file")]
    entity_type: EntityType,
    #[arg(long, default_value = "coding")]
    category: Category,
    /// Unix timestamp; defaults to now
    #[arg(long)]
    time: Option<f64>,
    /// Mark the heartbeat as triggered by a file save
    #[arg(long)]
    write: bool,
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    lineno: Option<u64>,
    #[arg(long)]
    lines_in_file: Option<u64>,
    #[arg(long)]
    cursorpos: Option<u64>,
    /// Editor plugin identifier appended to the user agent
    #[arg(long)]
    plugin: Option<String>,
    /// Read a JSON array of additional heartbeats from stdin
    #[arg(long)]
    extra_heartbeats: bool,

    /// API key; overrides settings.api_key
    #[arg(long)]
    key: Option<String>,
    #[arg(long)]
    api_url: Option<String>,
    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Config file; defaults to <home>/.wakatime.cfg
    #[arg(long)]
    config: Option<PathBuf>,
    /// Internal state file; defaults to <home>/.wakatime/wakatime-internal.cfg
    #[arg(long)]
    internal_config: Option<PathBuf>,
    #[arg(long, alias = "logfile")]
    log_file: Option<String>,
    #[arg(long)]
    log_to_stdout: bool,
    #[arg(long)]
    verbose: bool,

    /// `true`, `false` or newline-separated regexes
    #[arg(long)]
    hide_file_names: Option<String>,
    #[arg(long)]
    hide_project_names: Option<String>,
    #[arg(long)]
    hide_branch_names: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code::for_error(&err);
            tracing::error!(code, "{err:#}");
            if code != exit_code::BACKOFF {
                eprintln!("waka: {err:#}");
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let ctx = cmd_send::Context::load(cli)?;
    let log = waka_config::LogParams::load(&ctx.config, &ctx.home)?;
    logging::init(&log)?;

    let stdin = std::io::stdin();
    cmd_send::execute(cli, &ctx, &mut stdin.lock())?;
    Ok(())
}
