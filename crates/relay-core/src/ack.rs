//! # Acknowledgement Handles
//!
//! Every delivered message carries an `AckHandle` granted by the transport.
//! Exactly one settle call takes effect per handle; later calls are refused
//! locally and never reach the transport.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AckError, TransportError};
use crate::ports::AckSink;

const PENDING: u8 = 0;
const ACKED: u8 = 1;
const NACKED: u8 = 2;

/// Transport-assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Positive or negative acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckDecision {
    /// Message processed, remove it.
    Ack,
    /// Message not processed, eligible for redelivery.
    Nack,
}

impl AckDecision {
    fn code(self) -> u8 {
        match self {
            Self::Ack => ACKED,
            Self::Nack => NACKED,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            ACKED => Some(Self::Ack),
            NACKED => Some(Self::Nack),
            _ => None,
        }
    }
}

impl fmt::Display for AckDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str("ack"),
            Self::Nack => f.write_str("nack"),
        }
    }
}

/// Per-message acknowledgement token.
pub struct AckHandle {
    message_id: MessageId,
    sink: Arc<dyn AckSink>,
    state: AtomicU8,
    transport_error: Mutex<Option<TransportError>>,
}

impl AckHandle {
    /// Create a handle for `message_id` that settles through `sink`.
    pub fn new(message_id: MessageId, sink: Arc<dyn AckSink>) -> Self {
        Self {
            message_id,
            sink,
            state: AtomicU8::new(PENDING),
            transport_error: Mutex::new(None),
        }
    }

    /// The message this handle belongs to.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Positively acknowledge the message.
    pub fn ack(&self) -> Result<(), AckError> {
        self.settle(AckDecision::Ack)
    }

    /// Negatively acknowledge the message.
    pub fn nack(&self) -> Result<(), AckError> {
        self.settle(AckDecision::Nack)
    }

    /// The decision taken so far, `None` while unsettled.
    #[must_use]
    pub fn decision(&self) -> Option<AckDecision> {
        AckDecision::from_code(self.state.load(Ordering::Acquire))
    }

    /// Whether `ack` or `nack` already took effect.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.decision().is_some()
    }

    /// Take the transport failure recorded while settling, if any.
    pub(crate) fn take_transport_error(&self) -> Option<TransportError> {
        self.transport_error.lock().take()
    }

    fn settle(&self, decision: AckDecision) -> Result<(), AckError> {
        if let Err(previous) = self.state.compare_exchange(
            PENDING,
            decision.code(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(AckError::AlreadySettled {
                message_id: self.message_id,
                previous: AckDecision::from_code(previous).unwrap_or(decision),
            });
        }

        if let Err(e) = self.sink.settle(self.message_id, decision) {
            *self.transport_error.lock() = Some(e.clone());
            return Err(AckError::Transport(e));
        }
        Ok(())
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckHandle")
            .field("message_id", &self.message_id)
            .field("decision", &self.decision())
            .finish()
    }
}
