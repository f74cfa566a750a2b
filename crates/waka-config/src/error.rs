use thiserror::Error;

use waka_store::StoreError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed expanding log file: {0}")]
    LogFile(String),

    #[error("api key not found or empty")]
    MissingApiKey,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
