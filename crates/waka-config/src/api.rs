use std::time::Duration;

use waka_api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

use crate::config::Config;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiParams {
    pub key: String,
    pub url: String,
    pub timeout: Duration,
}

impl ApiParams {
    pub fn load(config: &Config) -> Result<Self, ConfigError> {
        let key = config
            .first_non_empty_string(&["key", "settings.api_key"])
            .ok_or(ConfigError::MissingApiKey)?
            .to_string();

        let url = config
            .first_non_empty_string(&["api-url", "settings.api_url"])
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let timeout = match config.first_non_empty_string(&["timeout", "settings.timeout"]) {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "timeout".to_string(),
                        value: raw.to_string(),
                    })
                }
            },
        };

        Ok(Self { key, url, timeout })
    }
}
