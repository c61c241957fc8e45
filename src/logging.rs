//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging lifecycle
//! transitions, event fan-out and reconnect behavior.

use crate::config::detect_environment;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
/// Safe to call repeatedly and from embedders that already installed a
/// global subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let log_level = get_log_level(&environment);

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(EnvFilter::new(log_level)),
        );

        // try_init instead of init: embedders may already have a global
        // subscriber installed, which is not an error here.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        } else {
            tracing::info!(environment = %environment, "structured logging initialized");
        }
    });
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
