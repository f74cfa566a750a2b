use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("secret unset")]
    EmptySecret,

    #[error("authentication failed (status {status})")]
    Auth { status: u16 },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[from] ureq::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("failed to encode heartbeats: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    /// Errors caused by local configuration rather than the remote endpoint.
    pub fn is_config(&self) -> bool {
        matches!(self, ApiError::EmptySecret)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }
}
