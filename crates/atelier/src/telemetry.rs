//! Tracing subscriber setup.

use atelier_error::{AtelierResult, ConfigError};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,atelier=debug";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directives (e.g., "info", "atelier_generation=trace")
    pub log_level: String,
    /// Enable JSON-formatted logs for structured logging
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Set the filter directives.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON logs.
    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Fails when the filter directives do not parse or a global subscriber is already set.
pub fn init_telemetry(config: &TelemetryConfig) -> AtelierResult<()> {
    let env_filter = EnvFilter::try_new(&config.log_level).map_err(|e| {
        ConfigError::new(format!("Invalid log filter '{}': {}", config.log_level, e))
    })?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::new(format!("Failed to install subscriber: {}", e)))?;

    tracing::debug!(filter = %config.log_level, json = config.json_logs, "Telemetry initialized");
    Ok(())
}
