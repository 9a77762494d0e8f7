//! # Relay Runtime Library
//!
//! Wires the relay together for the `relay-runtime` binary and for tests.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `RELAY_*` environment overrides)
//! 2. Build the handler directory
//! 3. Bootstrap the control plane (registry, router, one adapter per subscription)
//! 4. Attach every adapter to the in-memory transport
//! 5. Start the audit and delivery-metrics listeners
//! 6. Serve operator commands from the console
//!
//! ```text
//!  console ──pause/resume/status──→ ControlPlane ──ControlEvent──→ audit log + metrics
//!     │                                  │ start/stop
//!     └──publish──→ InMemoryTransport ──→ IngestionAdapter ──→ ChannelRouter ──→ handler
//!                          │
//!                          └──DeliveryRecord──→ delivery metrics
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod console;
pub mod handlers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use relay_core::{
    CommandReport, ControlCommand, ControlEvent, ControlPlane, DeliveryRecord, HandlerDirectory,
    InMemoryTransport, MessageId, RelayConfig, TransportError, DEFAULT_QUEUE_CAPACITY,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Tunables that are not part of the relay configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Deliveries queued per subscription.
    pub queue_capacity: usize,
    /// Redeliveries of a nacked message before it is dropped.
    pub max_redeliveries: u32,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_redeliveries: 0,
        }
    }
}

/// The running relay: control plane, transport and background listeners.
pub struct RelayRuntime {
    plane: Arc<ControlPlane>,
    transport: InMemoryTransport,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl RelayRuntime {
    /// Bootstrap the control plane. Nothing is delivered until `start`.
    ///
    /// # Errors
    ///
    /// Fails on invalid subscriptions or unknown handler ids.
    pub fn new(config: &RelayConfig, directory: &HandlerDirectory, options: RuntimeOptions) -> Result<Self> {
        let plane = ControlPlane::bootstrap(config, directory)
            .context("Failed to bootstrap control plane")?;
        let transport = InMemoryTransport::with_capacity(options.queue_capacity)
            .with_max_redeliveries(options.max_redeliveries);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            plane: Arc::new(plane),
            transport,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Attach adapters and spawn the listeners. Must run inside a tokio runtime.
    ///
    /// Only the first call has an effect.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("Relay runtime already started");
            return;
        }

        let audit = BroadcastStream::new(self.plane.subscribe());
        let deliveries = BroadcastStream::new(self.transport.subscribe_deliveries());

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(audit_loop(audit, self.shutdown_rx.clone())));
        tasks.push(tokio::spawn(delivery_loop(deliveries, self.shutdown_rx.clone())));
        drop(tasks);

        for adapter in self.plane.adapters() {
            self.transport.attach(Arc::clone(adapter));
            relay_telemetry::log_event!(
                debug,
                adapter.name(),
                "Adapter attached to transport",
                topic = adapter.subscription().topic()
            );
        }

        let counts = self.plane.state_counts();
        relay_telemetry::set_adapter_counts(counts.running, counts.stopped);
        info!(
            adapters = self.plane.adapters().len(),
            "Relay runtime started"
        );
    }

    /// Apply a control command to every adapter.
    pub fn execute(&self, command: ControlCommand) -> CommandReport {
        self.plane.execute(command)
    }

    /// Queue a message on the in-memory transport.
    ///
    /// # Errors
    ///
    /// Propagates the transport's rejection.
    pub fn publish(&self, subscription: &str, payload: impl Into<Vec<u8>>) -> Result<MessageId, TransportError> {
        self.transport.publish(subscription, payload)
    }

    /// One line per adapter: state and counters.
    #[must_use]
    pub fn status_lines(&self) -> Vec<String> {
        self.plane
            .adapters()
            .iter()
            .map(|adapter| {
                let sub = adapter.subscription();
                let stats = adapter.stats();
                format!(
                    "{} ({} -> {}): {} accepted={} acked={} nacked={} not_accepted={} in_flight={}",
                    sub.name(),
                    sub.topic(),
                    sub.handler_id(),
                    if adapter.is_running() { "running" } else { "stopped" },
                    stats.accepted,
                    stats.acked,
                    stats.nacked,
                    stats.not_accepted,
                    stats.in_flight,
                )
            })
            .collect()
    }

    /// The control plane.
    #[must_use]
    pub fn plane(&self) -> &Arc<ControlPlane> {
        &self.plane
    }

    /// The transport delivering into the adapters.
    #[must_use]
    pub fn transport(&self) -> &InMemoryTransport {
        &self.transport
    }

    /// Stop the listeners and drain the transport.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Pause every adapter so queued messages are refused
    /// 2. Close the transport and wait for its workers
    /// 3. Signal the listeners and wait for them
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        self.plane.execute(ControlCommand::Pause);
        self.transport.shutdown().await;

        if self.shutdown_tx.send(true).is_err() {
            debug!("No listener waiting for shutdown");
        }
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        info!("Shutdown complete");
    }
}

async fn audit_loop(mut events: BroadcastStream<ControlEvent>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            // Drain pending events before honouring shutdown.
            biased;
            item = events.next() => match item {
                Some(Ok(event)) => record_control_event(&event),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(skipped, "Audit listener lagged, control events dropped");
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn delivery_loop(mut records: BroadcastStream<DeliveryRecord>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            biased;
            item = records.next() => match item {
                Some(Ok(record)) => {
                    relay_telemetry::record_delivery(&record.subscription, record.status.label());
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(skipped, "Delivery listener lagged, records dropped");
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}

/// Write the audit line and update the control-plane metrics.
pub fn record_control_event(event: &ControlEvent) {
    match event {
        ControlEvent::AdapterTransitioned { to, .. } => {
            relay_telemetry::record_transition(&to.to_string());
        }
        ControlEvent::CommandCompleted {
            command,
            outcome,
            counts,
            ..
        } => {
            let label = if outcome.is_warning() { "ignored" } else { "applied" };
            relay_telemetry::record_command(command, label);
            relay_telemetry::set_adapter_counts(counts.running, counts.stopped);
        }
    }
    info!(target: "relay::audit", event = %event.to_json(), "Control event");
}
