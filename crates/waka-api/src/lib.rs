//! Terminal send for the dispatch pipeline: the `Authorization` header builder
//! and a blocking client for the bulk heartbeat endpoint.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::BasicAuth;
pub use client::{parse_bulk_response, Client, ClientOptions, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::ApiError;
