//! # Relay Telemetry
//!
//! Logging and metrics for the subscription relay.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events rendered pretty or as JSON lines
//! - **Metrics**: Prometheus counters, gauges and histograms, exposed as text
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `subscription-relay` | Service name in logs |
//! | `RELAY_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honoured) |
//! | `RELAY_JSON_LOGS` | `false` | JSON log lines |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::{
    encode_metrics, record_command, record_delivery, record_transition, register_metrics,
    set_adapter_counts, HistogramTimer, MetricsHandle, ADAPTERS_RUNNING, ADAPTERS_STOPPED,
    ADAPTER_TRANSITIONS, CONTROL_COMMANDS, DELIVERIES, HANDLER_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A metric could not be registered or encoded.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Initialize metrics first
    let metrics = register_metrics()?;

    logging::init_logging(config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
        metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    /// Registered metrics.
    #[must_use]
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
