//! # Outbound Ports
//!
//! The narrow interface the core uses to reach the transport collaborator.
//! The transport pushes deliveries into `IngestionAdapter::on_message`; the
//! core only calls back through `AckSink` to settle messages.

use crate::ack::{AckDecision, MessageId};
use crate::errors::TransportError;

/// Receives the ack/nack decision for delivered messages.
pub trait AckSink: Send + Sync {
    /// Record `decision` for `message_id`.
    ///
    /// Called at most once per message by `AckHandle`.
    fn settle(&self, message_id: MessageId, decision: AckDecision) -> Result<(), TransportError>;
}
