use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context as _;
use tracing_subscriber::{fmt, EnvFilter};
use waka_config::LogParams;

/// Install the global subscriber: `debug` when verbose, else `RUST_LOG` or `info`.
pub fn init(params: &LogParams) -> anyhow::Result<()> {
    let filter = if params.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let installed = if params.to_stdout {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stdout)
            .try_init()
    } else {
        if let Some(parent) = params.file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&params.file)
            .with_context(|| format!("failed to open log file {}", params.file.display()))?;
        fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
    };

    installed.map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}
