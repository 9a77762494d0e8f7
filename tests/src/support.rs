//! Shared fixtures for the integration scenarios.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::{
    handler_fn, AckDecision, AckHandle, AckMode, AckSink, ControlPlane, HandlerDirectory,
    HandlerError, MessageHandler, MessageId, RelayConfig, TransportError,
};

/// Ack sink recording every decision per message id.
#[derive(Debug, Default)]
pub struct LedgerSink {
    settled: Mutex<HashMap<MessageId, Vec<AckDecision>>>,
}

impl LedgerSink {
    /// Shared empty ledger.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fresh handle for a new message, settling into this ledger.
    pub fn handle(self: &Arc<Self>) -> AckHandle {
        AckHandle::new(MessageId::new(), Arc::clone(self) as Arc<dyn AckSink>)
    }

    /// Decisions recorded for `id`.
    pub fn decisions(&self, id: MessageId) -> Vec<AckDecision> {
        self.settled.lock().get(&id).cloned().unwrap_or_default()
    }

    /// Number of messages with at least one decision.
    pub fn messages(&self) -> usize {
        self.settled.lock().len()
    }

    /// Total decisions of one kind across all messages.
    pub fn count(&self, decision: AckDecision) -> usize {
        self.settled
            .lock()
            .values()
            .flatten()
            .filter(|d| **d == decision)
            .count()
    }

    /// Whether every recorded message was settled exactly once.
    pub fn all_settled_once(&self) -> bool {
        self.settled.lock().values().all(|d| d.len() == 1)
    }
}

impl AckSink for LedgerSink {
    fn settle(&self, message_id: MessageId, decision: AckDecision) -> Result<(), TransportError> {
        self.settled
            .lock()
            .entry(message_id)
            .or_default()
            .push(decision);
        Ok(())
    }
}

/// Handler that counts invocations and acks.
pub fn counting_acker(calls: Arc<AtomicUsize>) -> impl MessageHandler {
    handler_fn(move |_, ack| {
        calls.fetch_add(1, Ordering::SeqCst);
        ack.ack()?;
        Ok(())
    })
}

/// Handler that fails payloads starting with `bad` and acks the rest.
pub fn picky_handler(calls: Arc<AtomicUsize>) -> impl MessageHandler {
    handler_fn(move |payload, ack| {
        calls.fetch_add(1, Ordering::SeqCst);
        if payload.starts_with(b"bad") {
            return Err(HandlerError::Decode("rejected payload".to_string()));
        }
        ack.ack()?;
        Ok(())
    })
}

/// Control plane with `n` subscriptions `sub-0..n`, all bound to `handler`.
pub fn plane_with<H>(n: usize, handler: H) -> ControlPlane
where
    H: MessageHandler + 'static,
{
    let mut config = RelayConfig::new(AckMode::Manual);
    for i in 0..n {
        config = config.with_subscription(format!("sub-{i}"), format!("topic-{i}"), "shared");
    }

    let mut directory = HandlerDirectory::new();
    directory
        .register("shared", handler)
        .expect("fresh directory");
    ControlPlane::bootstrap(&config, &directory).expect("valid config")
}
