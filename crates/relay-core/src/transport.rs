//! # In-Memory Transport
//!
//! A vendor-free transport collaborator. Suitable for single-process
//! operation and tests; a broker-backed deployment would push deliveries into
//! the same `IngestionAdapter::on_message` entry point.
//!
//! - One worker task per attached subscription delivers in FIFO order.
//! - Handlers run through `spawn_blocking`, so blocking handlers only stall
//!   their own subscription.
//! - Every settlement is recorded; nacked messages may be redelivered up to
//!   `max_redeliveries` times (the retry policy lives here, not in the core).
//! - A message refused by a stopped adapter does not use up a redelivery. With
//!   redelivery enabled the worker holds it until the adapter runs again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ack::{AckDecision, AckHandle, MessageId};
use crate::adapter::{DeliveryOutcome, IngestionAdapter};
use crate::errors::TransportError;
use crate::ports::AckSink;
use crate::router::RouteOutcome;
use crate::{DEFAULT_EVENT_CAPACITY, DEFAULT_QUEUE_CAPACITY};

/// How often a held message checks whether its adapter resumed.
const RESUME_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What happened to one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Handler path acked the message.
    Acked,
    /// Handler path nacked the message.
    Nacked(String),
    /// The adapter was stopped; the handler was not invoked.
    NotAccepted,
    /// Recording the acknowledgement failed.
    TransportFailed(String),
}

impl DeliveryStatus {
    /// Short label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Acked => "acked",
            Self::Nacked(_) => "nacked",
            Self::NotAccepted => "not_accepted",
            Self::TransportFailed(_) => "transport_failed",
        }
    }
}

impl From<&DeliveryOutcome> for DeliveryStatus {
    fn from(outcome: &DeliveryOutcome) -> Self {
        match outcome {
            DeliveryOutcome::Processed(RouteOutcome::Acked) => Self::Acked,
            DeliveryOutcome::Processed(RouteOutcome::Nacked(reason)) => {
                Self::Nacked(reason.to_string())
            }
            DeliveryOutcome::NotAccepted => Self::NotAccepted,
        }
    }
}

/// One delivery attempt, broadcast after the adapter returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    /// Message delivered.
    pub message_id: MessageId,
    /// Subscription it was delivered to.
    pub subscription: String,
    /// Zero for the first delivery, incremented per redelivery.
    pub attempt: u32,
    /// Result of the attempt.
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone)]
struct Envelope {
    message_id: MessageId,
    subscription: String,
    payload: Arc<[u8]>,
    attempt: u32,
}

struct Inner {
    queues: RwLock<HashMap<String, mpsc::Sender<Envelope>>>,
    settlements: Mutex<Vec<(MessageId, AckDecision)>>,
    deliveries: broadcast::Sender<DeliveryRecord>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    published: AtomicU64,
    redelivered: AtomicU64,
    capacity: usize,
    max_redeliveries: AtomicU32,
    closed: AtomicBool,
}

impl AckSink for Inner {
    fn settle(&self, message_id: MessageId, decision: AckDecision) -> Result<(), TransportError> {
        self.settlements.lock().push((message_id, decision));
        Ok(())
    }
}

/// In-process transport pushing deliveries into attached adapters.
#[derive(Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

impl InMemoryTransport {
    /// Transport with default queue capacity and no redelivery.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Transport with `capacity` queued messages per subscription.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(capacity.max(1), 0)
    }

    /// Redeliver nacked messages up to `max` additional times.
    ///
    /// Applies to every clone of this transport and to attempts made after
    /// the call, including on subscriptions that are already attached.
    #[must_use]
    pub fn with_max_redeliveries(self, max: u32) -> Self {
        self.inner.max_redeliveries.store(max, Ordering::Relaxed);
        self
    }

    fn build(capacity: usize, max_redeliveries: u32) -> Self {
        let (deliveries, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                queues: RwLock::new(HashMap::new()),
                settlements: Mutex::new(Vec::new()),
                deliveries,
                workers: Mutex::new(Vec::new()),
                published: AtomicU64::new(0),
                redelivered: AtomicU64::new(0),
                capacity,
                max_redeliveries: AtomicU32::new(max_redeliveries),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Current redelivery limit.
    #[must_use]
    pub fn max_redeliveries(&self) -> u32 {
        self.inner.max_redeliveries.load(Ordering::Relaxed)
    }

    /// Start pushing deliveries for the adapter's subscription.
    ///
    /// Must be called from within a tokio runtime. Attaching a second adapter
    /// for the same subscription replaces the first queue.
    pub fn attach(&self, adapter: Arc<IngestionAdapter>) {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let name = adapter.name().to_string();

        if self.inner.queues.write().insert(name.clone(), tx).is_some() {
            warn!(subscription = %name, "Adapter re-attached, previous queue closed");
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(deliver_loop(inner, adapter, rx));
        self.inner.workers.lock().push(handle);
        debug!(subscription = %name, "Adapter attached to transport");
    }

    /// Queue `payload` for `subscription`.
    ///
    /// # Errors
    ///
    /// - `TransportError::UnknownSubscription` if no adapter is attached
    /// - `TransportError::QueueFull` if the subscription queue is full
    /// - `TransportError::Closed` if the transport shut down
    pub fn publish(&self, subscription: &str, payload: impl Into<Vec<u8>>) -> Result<MessageId, TransportError> {
        let queues = self.inner.queues.read();
        let tx = queues
            .get(subscription)
            .ok_or_else(|| TransportError::UnknownSubscription(subscription.to_string()))?;

        let envelope = Envelope {
            message_id: MessageId::new(),
            subscription: subscription.to_string(),
            payload: Arc::from(payload.into()),
            attempt: 0,
        };
        let message_id = envelope.message_id;

        if let Err(e) = tx.try_send(envelope) {
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => {
                    TransportError::QueueFull(subscription.to_string())
                }
                mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
            });
        }

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        Ok(message_id)
    }

    /// Listen for delivery records.
    #[must_use]
    pub fn subscribe_deliveries(&self) -> broadcast::Receiver<DeliveryRecord> {
        self.inner.deliveries.subscribe()
    }

    /// Every decision recorded for `message_id`, in order.
    #[must_use]
    pub fn settlements_for(&self, message_id: MessageId) -> Vec<AckDecision> {
        self.inner
            .settlements
            .lock()
            .iter()
            .filter(|(id, _)| *id == message_id)
            .map(|(_, d)| *d)
            .collect()
    }

    /// Total acks recorded.
    #[must_use]
    pub fn acked(&self) -> usize {
        self.count(AckDecision::Ack)
    }

    /// Total nacks recorded.
    #[must_use]
    pub fn nacked(&self) -> usize {
        self.count(AckDecision::Nack)
    }

    /// Messages accepted by `publish`.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Redeliveries queued after a nack.
    #[must_use]
    pub fn redelivered(&self) -> u64 {
        self.inner.redelivered.load(Ordering::Relaxed)
    }

    /// Whether an adapter is attached for `subscription`.
    #[must_use]
    pub fn is_attached(&self, subscription: &str) -> bool {
        self.inner.queues.read().contains_key(subscription)
    }

    /// Close every queue and wait for the workers to drain.
    ///
    /// Messages still held for a stopped adapter are dropped.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.queues.write().clear();
        let workers: Vec<_> = self.inner.workers.lock().drain(..).collect();
        for worker in workers {
            let _ = worker.await;
        }
        debug!("In-memory transport shut down");
    }

    fn count(&self, decision: AckDecision) -> usize {
        self.inner
            .settlements
            .lock()
            .iter()
            .filter(|(_, d)| *d == decision)
            .count()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn deliver_loop(inner: Arc<Inner>, adapter: Arc<IngestionAdapter>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(mut envelope) = rx.recv().await {
        loop {
            let status = deliver_once(&inner, &adapter, &envelope).await;
            let _ = inner.deliveries.send(DeliveryRecord {
                message_id: envelope.message_id,
                subscription: envelope.subscription.clone(),
                attempt: envelope.attempt,
                status: status.clone(),
            });

            let max = inner.max_redeliveries.load(Ordering::Relaxed);
            match status {
                DeliveryStatus::Acked | DeliveryStatus::TransportFailed(_) => break,
                DeliveryStatus::Nacked(_) if envelope.attempt < max => envelope.attempt += 1,
                DeliveryStatus::Nacked(_) => break,
                // Refusals are resent at the same attempt once the adapter runs.
                DeliveryStatus::NotAccepted => {
                    if max == 0 || !wait_until_running(&inner, &adapter).await {
                        break;
                    }
                }
            }

            inner.redelivered.fetch_add(1, Ordering::Relaxed);
            debug!(
                subscription = %envelope.subscription,
                message_id = %envelope.message_id,
                attempt = envelope.attempt,
                "Redelivering message"
            );
        }
    }
}

async fn deliver_once(inner: &Arc<Inner>, adapter: &Arc<IngestionAdapter>, envelope: &Envelope) -> DeliveryStatus {
    let sink: Arc<dyn AckSink> = Arc::clone(inner) as Arc<dyn AckSink>;
    let ack = AckHandle::new(envelope.message_id, sink);
    let worker_adapter = Arc::clone(adapter);
    let payload = Arc::clone(&envelope.payload);

    let result = tokio::task::spawn_blocking(move || worker_adapter.on_message(&payload, ack)).await;

    match result {
        Ok(Ok(outcome)) => DeliveryStatus::from(&outcome),
        Ok(Err(e)) => {
            warn!(
                subscription = %envelope.subscription,
                message_id = %envelope.message_id,
                error = %e,
                "Delivery failed in transport"
            );
            DeliveryStatus::TransportFailed(e.to_string())
        }
        Err(e) => DeliveryStatus::TransportFailed(e.to_string()),
    }
}

/// Hold until `adapter` runs again. Returns `false` if the transport closed first.
async fn wait_until_running(inner: &Inner, adapter: &IngestionAdapter) -> bool {
    loop {
        if inner.closed.load(Ordering::Acquire) {
            debug!(subscription = adapter.name(), "Transport closed, held message dropped");
            return false;
        }
        if adapter.is_running() {
            return true;
        }
        tokio::time::sleep(RESUME_POLL_INTERVAL).await;
    }
}
