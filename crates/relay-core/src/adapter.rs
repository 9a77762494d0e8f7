//! # Ingestion Adapter
//!
//! One adapter per subscription. It decides whether a pushed delivery is
//! accepted and forwards accepted messages to the `ChannelRouter`.
//!
//! ```text
//!            start()
//!   ┌─────────┐ ──────→ ┌─────────┐
//!   │ STOPPED │         │ RUNNING │  (initial state)
//!   └─────────┘ ←────── └─────────┘
//!            stop()
//! ```
//!
//! The acceptance check and the in-flight increment happen under the adapter
//! lock, so a `stop()` racing with `on_message` resolves to exactly one of
//! "processed" or "not accepted". Dispatch to the router happens outside the
//! lock; a slow handler never blocks `stop()`, and `stop()` never cancels a
//! handler that is already running.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ack::AckHandle;
use crate::errors::{AckError, TransportError};
use crate::registry::Subscription;
use crate::router::{ChannelRouter, RouteOutcome};

/// Result of pushing one delivery into an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The message was routed; the route outcome tells how it was settled.
    Processed(RouteOutcome),
    /// The adapter was not running. The handler was not invoked and the
    /// adapter nacked the message so the transport may redeliver it.
    NotAccepted,
}

/// Counters for one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterStats {
    /// Messages accepted while running.
    pub accepted: u64,
    /// Messages refused while stopped.
    pub not_accepted: u64,
    /// Accepted messages that ended acked.
    pub acked: u64,
    /// Accepted messages that ended nacked.
    pub nacked: u64,
    /// Accepted messages whose handler has not returned yet.
    pub in_flight: usize,
}

#[derive(Debug)]
struct AdapterState {
    running: bool,
}

/// Governs whether new messages for one subscription are accepted.
#[derive(Debug)]
pub struct IngestionAdapter {
    subscription: Subscription,
    router: Arc<ChannelRouter>,
    state: Mutex<AdapterState>,
    in_flight: AtomicUsize,
    accepted: AtomicU64,
    not_accepted: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
}

impl IngestionAdapter {
    /// Create a running adapter for `subscription`.
    pub fn new(subscription: Subscription, router: Arc<ChannelRouter>) -> Self {
        info!(
            subscription = subscription.name(),
            topic = subscription.topic(),
            "Ingestion adapter started"
        );
        Self {
            subscription,
            router,
            state: Mutex::new(AdapterState { running: true }),
            in_flight: AtomicUsize::new(0),
            accepted: AtomicU64::new(0),
            not_accepted: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            nacked: AtomicU64::new(0),
        }
    }

    /// The subscription this adapter serves.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Subscription name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.subscription.name()
    }

    /// Whether new messages are currently accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Resume accepting messages. Returns `true` if the adapter was stopped.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.running {
            return false;
        }
        state.running = true;
        drop(state);

        info!(subscription = self.name(), "Ingestion adapter started");
        true
    }

    /// Stop accepting messages. Returns `true` if the adapter was running.
    ///
    /// Messages already handed to the router keep running to completion.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if !state.running {
            return false;
        }
        state.running = false;
        drop(state);

        info!(
            subscription = self.name(),
            in_flight = self.in_flight(),
            "Ingestion adapter stopped"
        );
        true
    }

    /// Handle a delivery pushed by the transport.
    ///
    /// Returns an error only when the transport fails to record the
    /// acknowledgement.
    pub fn on_message(&self, payload: &[u8], ack: AckHandle) -> Result<DeliveryOutcome, TransportError> {
        {
            let state = self.state.lock();
            if !state.running {
                drop(state);
                return self.refuse(ack);
            }
            self.in_flight.fetch_add(1, Ordering::AcqRel);
        }
        self.accepted.fetch_add(1, Ordering::Relaxed);

        debug!(
            subscription = self.name(),
            message_id = %ack.message_id(),
            bytes = payload.len(),
            "Message accepted"
        );

        let routed = self.router.route(self.name(), payload, &ack);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);

        let outcome = routed?;
        match outcome {
            RouteOutcome::Acked => self.acked.fetch_add(1, Ordering::Relaxed),
            RouteOutcome::Nacked(_) => self.nacked.fetch_add(1, Ordering::Relaxed),
        };
        Ok(DeliveryOutcome::Processed(outcome))
    }

    /// Number of accepted messages whose handler has not returned.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Snapshot of the adapter counters.
    #[must_use]
    pub fn stats(&self) -> AdapterStats {
        AdapterStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            not_accepted: self.not_accepted.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }

    fn refuse(&self, ack: AckHandle) -> Result<DeliveryOutcome, TransportError> {
        self.not_accepted.fetch_add(1, Ordering::Relaxed);
        warn!(
            subscription = self.name(),
            message_id = %ack.message_id(),
            "Not running, message not accepted"
        );

        match ack.nack() {
            Ok(()) | Err(AckError::AlreadySettled { .. }) => Ok(DeliveryOutcome::NotAccepted),
            Err(AckError::Transport(e)) => Err(e),
        }
    }
}
