// src/logging.rs

//! Logging setup for `eventflow` using `tracing` + `tracing-subscriber`.
//!
//! The engine itself only emits `tracing` events; installing a subscriber
//! is the embedding application's call. This helper covers the common case:
//! level taken from the `EVENTFLOW_LOG` environment variable (e.g. "info",
//! "debug"), defaulting to `info`.

use anyhow::Result;
use tracing_subscriber::fmt;

/// Initialise a global logging subscriber.
///
/// Safe to call once at startup; panics if a subscriber is already set,
/// so libraries embedding eventflow should install their own instead.
pub fn init_logging() -> Result<()> {
    let level = std::env::var("EVENTFLOW_LOG")
        .ok()
        .and_then(|s| parse_level_str(&s))
        .unwrap_or(tracing::Level::INFO);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
