//! # Relay Errors
//!
//! Error taxonomy for the relay core.
//!
//! | Error | Raised by | Severity |
//! |-------|-----------|----------|
//! | `ConfigError` | config parsing, `SubscriptionRegistry::load` | fatal at startup |
//! | `BindError` | `HandlerDirectory`, `ChannelRouter::bind` | fatal at startup |
//! | `HandlerError` | message handlers | recovered, converted to a nack |
//! | `TransportError` | transport collaborator | surfaced to the delivery caller |
//! | `AckError` | `AckHandle` | reported to the caller that settled twice |

use thiserror::Error;

use crate::ack::{AckDecision, MessageId};

/// Invalid or unreadable relay configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// Config text is not valid TOML or has the wrong shape.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A subscription entry lacks a required field.
    #[error("subscription entry #{index} is missing required field `{field}`")]
    MissingField {
        /// Zero-based position of the entry in the configuration.
        index: usize,
        /// Name of the missing field.
        field: &'static str,
    },

    /// Two subscription entries share the same name.
    #[error("duplicate subscription name `{0}`")]
    DuplicateSubscription(String),

    /// Unrecognised acknowledgement mode.
    #[error("invalid ack mode `{0}` (expected `manual` or `auto`)")]
    InvalidAckMode(String),
}

/// Failure to bind handlers to subscriptions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A handler id was registered twice.
    #[error("handler `{0}` is already registered")]
    DuplicateHandler(String),

    /// A subscription references a handler id that was never registered.
    #[error("unknown handler `{handler}` for subscription `{subscription}`")]
    UnknownHandler {
        /// The unresolved handler id.
        handler: String,
        /// The subscription that referenced it, empty for direct lookups.
        subscription: String,
    },
}

/// Failure reported by a message handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The payload could not be decoded.
    #[error("payload could not be decoded: {0}")]
    Decode(String),

    /// Processing failed.
    #[error("processing failed: {0}")]
    Failed(String),

    /// Settling the message failed.
    #[error("acknowledgement failed: {0}")]
    Ack(#[from] AckError),
}

impl HandlerError {
    /// Shorthand for `HandlerError::Failed`.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Delivery-layer failure reported by the transport collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No adapter is attached for the subscription.
    #[error("no subscription named `{0}` is attached to the transport")]
    UnknownSubscription(String),

    /// The subscription's delivery queue is full.
    #[error("delivery queue for `{0}` is full")]
    QueueFull(String),

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,

    /// The transport rejected an acknowledgement.
    #[error("settlement of message {message_id} failed: {reason}")]
    SettleFailed {
        /// Message being settled.
        message_id: MessageId,
        /// Transport-provided reason.
        reason: String,
    },
}

/// Misuse of an `AckHandle`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AckError {
    /// The message was already acked or nacked.
    #[error("message {message_id} already settled as {previous}")]
    AlreadySettled {
        /// Message being settled.
        message_id: MessageId,
        /// Decision that was taken first.
        previous: AckDecision,
    },

    /// The transport failed to record the decision.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Startup failure: anything that must prevent the relay from starting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Handler binding failed.
    #[error("binding error: {0}")]
    Bind(#[from] BindError),
}
