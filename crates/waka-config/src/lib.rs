//! Layered configuration for waka: command-line flags over `~/.wakatime.cfg`.

pub mod api;
pub mod config;
pub mod error;
pub mod logfile;
pub mod sanitize;

pub use api::ApiParams;
pub use waka_api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use config::{parse_bool, Config};
pub use error::ConfigError;
pub use logfile::{expand_home, LogParams};
pub use sanitize::{load_sanitize_config, parse_patterns};
