//! Telemetry configuration from environment variables.

use std::env;

use serde::Serialize;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "subscription-relay".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_SERVICE_NAME`: Service name (default: subscription-relay)
    /// - `RELAY_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `RELAY_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `RELAY_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("RELAY_SERVICE_NAME")
                .unwrap_or_else(|_| "subscription-relay".to_string()),

            log_level: env::var("RELAY_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("RELAY_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            json_logs: env::var("RELAY_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),
        }
    }

    /// Override the log level, e.g. from a command-line flag.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Force JSON output on or off.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
