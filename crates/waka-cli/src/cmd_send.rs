use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use time::OffsetDateTime;
use waka_api::{BasicAuth, Client, ClientOptions};
use waka_backoff::{BackoffState, WithBackoff};
use waka_config::{load_sanitize_config, ApiParams, Config, ConfigError};
use waka_core::{Heartbeat, HeartbeatResult, Pipeline, WithSanitization};
use waka_store::{IniFileStore, SettingsStore};

use crate::Cli;

/// Resolved home, layered config and internal state path for one run.
pub struct Context {
    pub home: PathBuf,
    pub config: Config,
    pub internal_file: PathBuf,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let home = waka_store::waka_home_dir()?;
        let config_file = cli
            .config
            .clone()
            .unwrap_or_else(|| waka_store::config_file_path(&home));
        let mut config = Config::load(&config_file)?;
        apply_flags(cli, &mut config);

        let internal_file = cli
            .internal_config
            .clone()
            .unwrap_or_else(|| waka_store::internal_file_path(&home));

        Ok(Self {
            home,
            config,
            internal_file,
        })
    }
}

/// Layer explicit command-line values over the config file.
pub fn apply_flags(cli: &Cli, config: &mut Config) {
    let values = [
        ("key", cli.key.clone()),
        ("api-url", cli.api_url.clone()),
        ("timeout", cli.timeout.map(|t| t.to_string())),
        ("log-file", cli.log_file.clone()),
        ("hide-file-names", cli.hide_file_names.clone()),
        ("hide-project-names", cli.hide_project_names.clone()),
        ("hide-branch-names", cli.hide_branch_names.clone()),
    ];
    for (key, value) in values {
        if let Some(value) = value {
            config.set_flag(key, value);
        }
    }
    if cli.log_to_stdout {
        config.set_flag("log-to-stdout", "true");
    }
    if cli.verbose {
        config.set_flag("verbose", "true");
    }
}

/// Build the batch, assemble the pipeline and send.
pub fn execute(cli: &Cli, ctx: &Context, stdin: &mut dyn Read) -> anyhow::Result<Vec<HeartbeatResult>> {
    let api = ApiParams::load(&ctx.config)?;
    let sanitize = load_sanitize_config(&ctx.config);

    let user_agent = user_agent(cli.plugin.as_deref());
    let mut heartbeats = vec![primary_heartbeat(cli, &user_agent, OffsetDateTime::now_utc())];
    if cli.extra_heartbeats {
        heartbeats.extend(read_extra_heartbeats(stdin, &user_agent)?);
    }

    let store: Arc<dyn SettingsStore> = Arc::new(IniFileStore::new(&ctx.internal_file));
    let state = BackoffState::load(store.as_ref());

    let client = Client::new(ClientOptions {
        base_url: api.url,
        auth: BasicAuth::new(api.key),
        timeout: api.timeout,
    })?;

    let pipeline = Pipeline::new()
        .stage(WithBackoff::new(state, store))
        .stage(WithSanitization::new(sanitize));
    tracing::debug!(count = heartbeats.len(), "dispatching heartbeats");
    let handle = pipeline.build(client);

    let results = handle.handle(heartbeats)?;
    for result in &results {
        if result.is_success() {
            tracing::debug!(status = result.status, "heartbeat accepted");
        } else {
            tracing::warn!(status = result.status, errors = ?result.errors, "heartbeat rejected");
        }
    }
    Ok(results)
}

pub fn user_agent(plugin: Option<&str>) -> String {
    let base = format!(
        "waka/{} ({}-{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    match plugin.map(str::trim).filter(|p| !p.is_empty()) {
        Some(plugin) => format!("{base} {plugin}"),
        None => base,
    }
}

fn primary_heartbeat(cli: &Cli, user_agent: &str, now: OffsetDateTime) -> Heartbeat {
    let time = cli
        .time
        .unwrap_or_else(|| now.unix_timestamp_nanos() as f64 / 1e9);
    let mut h = Heartbeat::new(&cli.entity, cli.entity_type, cli.category, time, user_agent);
    h.branch = cli.branch.clone();
    h.cursor_position = cli.cursorpos;
    h.is_write = cli.write.then_some(true);
    h.language = cli.language.clone();
    h.line_number = cli.lineno;
    h.lines = cli.lines_in_file;
    h.project = cli.project.clone();
    h
}

/// Parse a JSON array of heartbeats. Entries without `user_agent` get ours.
fn read_extra_heartbeats(input: &mut dyn Read, user_agent: &str) -> anyhow::Result<Vec<Heartbeat>> {
    let mut raw = String::new();
    input
        .read_to_string(&mut raw)
        .context("failed to read extra heartbeats")?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<serde_json::Value> =
        serde_json::from_str(&raw).context("extra heartbeats must be a JSON array")?;
    values
        .into_iter()
        .enumerate()
        .map(|(idx, mut value)| {
            if let Some(obj) = value.as_object_mut() {
                obj.entry("user_agent")
                    .or_insert_with(|| serde_json::Value::from(user_agent));
            }
            serde_json::from_value::<Heartbeat>(value).with_context(|| format!("invalid extra heartbeat #{idx}"))
        })
        .collect()
}
