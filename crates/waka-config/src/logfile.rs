use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;

const DEFAULT_LOG_FILE: &str = ".wakatime.log";

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogParams {
    pub file: PathBuf,
    pub to_stdout: bool,
    pub verbose: bool,
}

impl LogParams {
    /// Resolve log parameters. `home` is the resolved waka home, used for the
    /// default log path.
    ///
    /// An explicit `log-file`, `logfile` or `settings.log_file` wins over the
    /// default and disables `log-to-stdout`.
    pub fn load(config: &Config, home: &Path) -> Result<Self, ConfigError> {
        let debug = config.get_bool("settings.debug");
        let verbose = config.get_bool("verbose") || debug;

        if let Some(file) = config.first_non_empty_string(&["log-file", "logfile", "settings.log_file"]) {
            return Ok(Self {
                file: expand_home(file)?,
                to_stdout: false,
                verbose,
            });
        }

        Ok(Self {
            file: home.join(DEFAULT_LOG_FILE),
            to_stdout: config.get_bool("log-to-stdout"),
            verbose,
        })
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    expand_home_with(path, dirs::home_dir().as_deref())
}

fn expand_home_with(path: &str, user_home: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let Some(rest) = path.strip_prefix('~') else {
        return Ok(PathBuf::from(path));
    };
    if !rest.is_empty() && !rest.starts_with('/') && !rest.starts_with('\\') {
        return Err(ConfigError::LogFile(format!(
            "cannot expand user-specific home dir: {path}"
        )));
    }
    let home = user_home
        .ok_or_else(|| ConfigError::LogFile("user home directory not found".to_string()))?;
    let rest = rest.trim_start_matches(|c: char| c == '/' || c == '\\');
    if rest.is_empty() {
        Ok(home.to_path_buf())
    } else {
        Ok(home.join(rest))
    }
}
