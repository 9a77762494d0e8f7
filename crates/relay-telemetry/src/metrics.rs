//! Prometheus metrics for the subscription relay.
//!
//! All metrics follow the naming convention: `relay_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., deliveries_total)
//! - **Gauge**: Value that can go up or down (e.g., adapters_running)
//! - **Histogram**: Distribution of values (e.g., handler_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DELIVERY METRICS
    // =========================================================================

    /// Deliveries by subscription and final status
    pub static ref DELIVERIES: CounterVec = CounterVec::new(
        Opts::new("relay_deliveries_total", "Total deliveries pushed into ingestion adapters"),
        &["subscription", "status"]  // status: acked/nacked/not_accepted/transport_failed
    ).expect("metric creation failed");

    /// Handler execution time
    pub static ref HANDLER_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "relay_handler_duration_seconds",
            "Time spent inside message handlers"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("valid buckets")),
        &["handler"]
    ).expect("metric creation failed");

    // =========================================================================
    // CONTROL PLANE METRICS
    // =========================================================================

    /// Control commands by name and outcome
    pub static ref CONTROL_COMMANDS: CounterVec = CounterVec::new(
        Opts::new("relay_control_commands_total", "Total control commands executed"),
        &["command", "outcome"]  // outcome: applied/ignored
    ).expect("metric creation failed");

    /// Adapter state transitions by target state
    pub static ref ADAPTER_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("relay_adapter_transitions_total", "Total adapter state transitions"),
        &["to"]  // to: running/stopped
    ).expect("metric creation failed");

    /// Adapters currently accepting messages
    pub static ref ADAPTERS_RUNNING: Gauge = Gauge::new(
        "relay_adapters_running",
        "Number of ingestion adapters accepting messages"
    ).expect("metric creation failed");

    /// Adapters currently paused
    pub static ref ADAPTERS_STOPPED: Gauge = Gauge::new(
        "relay_adapters_stopped",
        "Number of ingestion adapters not accepting messages"
    ).expect("metric creation failed");
}

/// Handle to the registered metrics.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Registry holding the relay metrics.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register every relay metric with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(DELIVERIES.clone()),
        Box::new(HANDLER_DURATION.clone()),
        Box::new(CONTROL_COMMANDS.clone()),
        Box::new(ADAPTER_TRANSITIONS.clone()),
        Box::new(ADAPTERS_RUNNING.clone()),
        Box::new(ADAPTERS_STOPPED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Count one delivery attempt.
pub fn record_delivery(subscription: &str, status: &str) {
    DELIVERIES.with_label_values(&[subscription, status]).inc();
}

/// Count one control command.
pub fn record_command(command: &str, outcome: &str) {
    CONTROL_COMMANDS.with_label_values(&[command, outcome]).inc();
}

/// Count one adapter transition into `to`.
pub fn record_transition(to: &str) {
    ADAPTER_TRANSITIONS.with_label_values(&[to]).inc();
}

/// Publish the current adapter state counts.
pub fn set_adapter_counts(running: usize, stopped: usize) {
    ADAPTERS_RUNNING.set(running as f64);
    ADAPTERS_STOPPED.set(stopped as f64);
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }

    /// Start a timer for one handler's duration series.
    pub fn for_handler(handler: &str) -> Self {
        Self::new(&HANDLER_DURATION.with_label_values(&[handler]))
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
