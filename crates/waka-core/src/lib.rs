pub mod error;
pub mod heartbeat;
pub mod pipeline;
pub mod sanitize;

pub use error::DispatchError;
pub use heartbeat::{Category, EntityType, Heartbeat, HeartbeatResult, ParseKindError};
pub use pipeline::{DispatchResult, Handle, Pipeline, Stage};
pub use sanitize::{sanitize, should_sanitize, SanitizeConfig, WithSanitization};
