//! Structured logging.
//!
//! Pretty output for development, JSON lines for containers. JSON lines
//! carry consistent fields a log shipper can parse:
//! - `timestamp`: ISO 8601 timestamp
//! - `level`: Log level (trace, debug, info, warn, error)
//! - `target`: Module that emitted the event
//! - `fields.message`: Log message
//! - `fields.subscription`: Subscription name, where relevant

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Build the filter from `RUST_LOG`, falling back to the configured level.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = build_filter(config)?;

    if !config.console_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
        return Ok(());
    }

    if config.json_logs {
        // JSON output for containers/production
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        // Pretty output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}

/// Log an event with the subscription as a structured field.
///
/// ```rust,ignore
/// log_event!(info, "orders-sub", "Handler registered", handler = "audit");
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $subscription:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            subscription = $subscription,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $subscription:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            subscription = $subscription,
            $($($field)*,)?
            $msg
        )
    };

    (error, $subscription:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            subscription = $subscription,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $subscription:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            subscription = $subscription,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_directive() {
        let config = TelemetryConfig::default().with_log_level("relay_core=debug,warn");
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_log_event_macro_expands() {
        // No subscriber installed; the macro only has to compile and run.
        log_event!(info, "sub-1", "Handler registered", handler = "log");
        log_event!(warn, "sub-1", "Slow handler");
    }
}
