//! Shared tracing/logging initialization.
//!
//! Hosts embedding the background engine set up `tracing_subscriber` with an
//! env-filter and optional JSON output through this helper.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"fedibridge_background=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}

/// Initialise tracing from the `logging` config section.
pub fn init_from_config(logging: &LoggingConfig) -> bool {
    let filter = default_filter(&logging.level);
    init_tracing(&filter, logging.json)
}

/// Build the default filter directive for the fedibridge crates.
pub fn default_filter(level: &str) -> String {
    format!("fedibridge_core={level},fedibridge_background={level}")
}
