//! # Relay Core - Subscription Relay Control Plane
//!
//! Binds pub/sub subscriptions to named handlers and lets an operator pause
//! and resume ingestion for every subscription at once.
//!
//! ## Components
//!
//! | Component | Responsibility |
//! |-----------|----------------|
//! | `SubscriptionRegistry` | Validated subscription list, loaded once |
//! | `HandlerDirectory` | Name to handler lookup |
//! | `ChannelRouter` | Per-subscription dispatch, settles every message |
//! | `IngestionAdapter` | Accept or refuse deliveries for one subscription |
//! | `ControlPlane` | `pause` / `resume` / `status` over all adapters |
//! | `InMemoryTransport` | Vendor-free transport pushing deliveries |
//!
//! ## Message Flow
//!
//! ```text
//! ┌───────────┐  on_message   ┌──────────────────┐  route   ┌───────────────┐
//! │ Transport │ ────────────→ │ IngestionAdapter │ ───────→ │ ChannelRouter │
//! └───────────┘               └──────────────────┘          └───────┬───────┘
//!       ↑                              ↑                            │ handle
//!       │ settle (ack / nack)          │ start / stop               ▼
//!       └──────────────────────  ┌──────────────┐           ┌─────────────┐
//!                                │ ControlPlane │           │   Handler   │
//!                                └──────────────┘           └─────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Every delivery is settled exactly once: acked or nacked.
//! - A stopped adapter never invokes a handler.
//! - Pausing never cancels a handler that is already running.
//! - A failing or panicking handler never stops its adapter.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod ack;
pub mod adapter;
pub mod config;
pub mod control;
pub mod directory;
pub mod errors;
pub mod events;
pub mod ports;
pub mod registry;
pub mod router;
pub mod transport;

// Re-export main types
pub use ack::{AckDecision, AckHandle, MessageId};
pub use adapter::{AdapterStats, DeliveryOutcome, IngestionAdapter};
pub use config::{AckMode, RelayConfig, SubscriptionConfig};
pub use control::{CommandOutcome, CommandReport, ControlCommand, ControlPlane, StateCounts};
pub use directory::{handler_fn, HandlerDirectory, MessageHandler};
pub use errors::{AckError, BindError, ConfigError, HandlerError, RelayError, TransportError};
pub use events::{AdapterState, ControlEvent};
pub use ports::AckSink;
pub use registry::{Subscription, SubscriptionRegistry};
pub use router::{ChannelRouter, NackReason, RouteOutcome};
pub use transport::{DeliveryRecord, DeliveryStatus, InMemoryTransport};

/// Control events buffered per listener before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Deliveries queued per subscription in the in-memory transport.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
