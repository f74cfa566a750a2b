use std::time::Duration;

use serde::Deserialize;

use waka_core::{DispatchError, DispatchResult, Handle, Heartbeat, HeartbeatResult};

use crate::auth::BasicAuth;
use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://api.wakatime.com/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const BULK_PATH: &str = "/users/current/heartbeats.bulk";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub auth: BasicAuth,
    pub timeout: Duration,
}

/// Blocking client for the bulk heartbeat endpoint; the pipeline's terminal handle.
pub struct Client {
    base_url: String,
    auth_header: String,
    agent: ureq::Agent,
}

impl Client {
    /// Build a client. Fails fast on an empty secret.
    pub fn new(options: ClientOptions) -> Result<Self, ApiError> {
        let auth_header = options.auth.header_value()?;
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(options.timeout))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            auth_header,
            agent,
        })
    }

    pub fn bulk_url(&self) -> String {
        format!("{}{BULK_PATH}", self.base_url)
    }

    /// POST the batch and return one result per accepted heartbeat.
    pub fn send_heartbeats(&self, heartbeats: &[Heartbeat]) -> Result<Vec<HeartbeatResult>, ApiError> {
        let url = self.bulk_url();
        let body = serde_json::to_string(heartbeats)?;
        let user_agent = heartbeats
            .first()
            .map(|h| h.user_agent.as_str())
            .unwrap_or("waka");

        tracing::debug!(url = %url, count = heartbeats.len(), "sending heartbeats");

        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("User-Agent", user_agent)
            .send(&body)?;

        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;

        match status {
            200 | 201 | 202 => {
                let results = parse_bulk_response(&text)?;
                if results.len() != heartbeats.len() {
                    tracing::warn!(
                        "sent {} heartbeats but got {} results",
                        heartbeats.len(),
                        results.len()
                    );
                }
                Ok(results)
            }
            401 | 403 => Err(ApiError::Auth { status }),
            400 => Err(ApiError::BadRequest(text)),
            _ => Err(ApiError::Status { status, body: text }),
        }
    }
}

impl Handle for Client {
    fn handle(&self, batch: Vec<Heartbeat>) -> DispatchResult {
        self.send_heartbeats(&batch).map_err(DispatchError::transport)
    }
}

// ── Response parsing ──

#[derive(Deserialize)]
struct BulkResponse {
    responses: Vec<(serde_json::Value, u16)>,
}

/// Parse `{"responses": [[body, status], ...]}` into aligned results.
pub fn parse_bulk_response(text: &str) -> Result<Vec<HeartbeatResult>, ApiError> {
    let parsed: BulkResponse =
        serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(parsed
        .responses
        .into_iter()
        .map(|(body, status)| HeartbeatResult {
            status,
            errors: collect_errors(&body),
        })
        .collect())
}

fn collect_errors(body: &serde_json::Value) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(msg) = body.get("error").and_then(|v| v.as_str()) {
        errors.push(msg.to_string());
    }
    match body.get("errors") {
        Some(serde_json::Value::Object(fields)) => {
            for (field, v) in fields {
                match v {
                    serde_json::Value::Array(items) => {
                        for item in items.iter().filter_map(|i| i.as_str()) {
                            errors.push(format!("{field}: {item}"));
                        }
                    }
                    serde_json::Value::String(s) => errors.push(format!("{field}: {s}")),
                    _ => {}
                }
            }
        }
        Some(serde_json::Value::Array(items)) => {
            errors.extend(items.iter().filter_map(|i| i.as_str()).map(str::to_string));
        }
        Some(serde_json::Value::String(s)) => errors.push(s.clone()),
        _ => {}
    }
    errors
}
