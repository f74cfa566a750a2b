use waka_api::ApiError;
use waka_config::ConfigError;
use waka_core::DispatchError;
use waka_store::StoreError;

pub const GENERIC: u8 = 1;
pub const API: u8 = 102;
pub const CONFIG: u8 = 103;
pub const AUTH: u8 = 104;
pub const BACKOFF: u8 = 112;

/// Process exit code for a failed run.
pub fn for_error(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<DispatchError>() {
        if e.is_backoff() {
            return BACKOFF;
        }
        return e.transport_cause::<ApiError>().map(for_api).unwrap_or(API);
    }
    if let Some(e) = err.downcast_ref::<ApiError>() {
        return for_api(e);
    }
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<StoreError>().is_some() {
        return CONFIG;
    }
    GENERIC
}

fn for_api(err: &ApiError) -> u8 {
    if err.is_auth() {
        AUTH
    } else if err.is_config() {
        CONFIG
    } else {
        API
    }
}
