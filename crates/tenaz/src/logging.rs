//! Tracing subscriber setup.
//!
//! The engine only emits `tracing` events; installing a subscriber is left to
//! the test binary. These helpers cover the two common shapes: human-readable
//! output while developing and JSON lines for CI log collectors.
//!
//! `RUST_LOG` takes precedence over the filter passed in.

use crate::result::{TenazError, TenazResult};
use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor the caller provides one
pub const DEFAULT_FILTER: &str = "tenaz=info";

fn env_filter(fallback: &str) -> TenazResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(fallback).map_err(|e| TenazError::Config {
            message: format!("invalid log filter {fallback:?}: {e}"),
        }),
    }
}

/// Install a human-readable subscriber.
///
/// Returns `Ok(false)` when a global subscriber was already installed, so
/// every test may call it.
pub fn init_tracing(filter: &str) -> TenazResult<bool> {
    let filter = env_filter(filter)?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok())
}

/// Install a JSON-lines subscriber.
///
/// Returns `Ok(false)` when a global subscriber was already installed.
pub fn init_json_tracing(filter: &str) -> TenazResult<bool> {
    let filter = env_filter(filter)?;
    Ok(tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .try_init()
        .is_ok())
}
