//! # Channel Router
//!
//! Binds every subscription to its handler once at startup and dispatches
//! messages to the bound handler.
//!
//! ## Settlement Rules
//!
//! | Handler result | Handler settled? | Router action |
//! |----------------|------------------|---------------|
//! | `Ok` | yes | keep the handler's decision |
//! | `Ok` | no, `AckMode::Auto` | ack |
//! | `Ok` | no, `AckMode::Manual` | warn, nack |
//! | `Err` / panic | no | log error, nack |
//! | `Err` / panic | yes | log error, keep the handler's decision |
//!
//! A failing handler never propagates out of `route`, so one subscription's
//! failures cannot stop ingestion for the others.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::ack::{AckDecision, AckHandle};
use crate::config::AckMode;
use crate::directory::{HandlerDirectory, MessageHandler};
use crate::errors::{AckError, BindError, HandlerError, TransportError};
use crate::registry::{Subscription, SubscriptionRegistry};

/// Why a message ended up nacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NackReason {
    /// The handler chose to nack.
    Rejected,
    /// The handler returned an error.
    HandlerFailed(HandlerError),
    /// The handler panicked.
    HandlerPanicked(String),
    /// The handler returned without settling under `AckMode::Manual`.
    Unsettled,
    /// No route exists for the subscription.
    UnknownSubscription,
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => f.write_str("rejected by handler"),
            Self::HandlerFailed(e) => write!(f, "handler failed: {e}"),
            Self::HandlerPanicked(msg) => write!(f, "handler panicked: {msg}"),
            Self::Unsettled => f.write_str("handler returned without settling"),
            Self::UnknownSubscription => f.write_str("no route for subscription"),
        }
    }
}

/// Final outcome of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The message was acked.
    Acked,
    /// The message was nacked.
    Nacked(NackReason),
}

impl RouteOutcome {
    /// The decision sent to the transport.
    #[must_use]
    pub fn decision(&self) -> AckDecision {
        match self {
            Self::Acked => AckDecision::Ack,
            Self::Nacked(_) => AckDecision::Nack,
        }
    }
}

struct Route {
    handler_id: String,
    handler: Arc<dyn MessageHandler>,
}

/// Dispatches messages to the handler bound to their subscription.
pub struct ChannelRouter {
    routes: HashMap<String, Route>,
    ack_mode: AckMode,
}

impl ChannelRouter {
    /// Resolve every subscription's handler.
    ///
    /// # Errors
    ///
    /// `BindError::UnknownHandler` naming the first subscription whose
    /// handler is not in `directory`.
    pub fn bind(
        registry: &SubscriptionRegistry,
        directory: &HandlerDirectory,
        ack_mode: AckMode,
    ) -> Result<Self, BindError> {
        let mut routes = HashMap::with_capacity(registry.len());

        for subscription in registry.subscriptions() {
            let handler = directory.resolve(subscription.handler_id()).map_err(|_| {
                BindError::UnknownHandler {
                    handler: subscription.handler_id().to_string(),
                    subscription: subscription.name().to_string(),
                }
            })?;

            debug!(
                subscription = subscription.name(),
                handler = subscription.handler_id(),
                "Route bound"
            );
            routes.insert(
                subscription.name().to_string(),
                Route {
                    handler_id: subscription.handler_id().to_string(),
                    handler,
                },
            );
        }

        Ok(Self { routes, ack_mode })
    }

    /// Acknowledgement mode applied to unsettled messages.
    #[must_use]
    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    /// Whether a route exists for `subscription`.
    #[must_use]
    pub fn has_route(&self, subscription: &str) -> bool {
        self.routes.contains_key(subscription)
    }

    /// Handler id bound to `subscription`.
    #[must_use]
    pub fn handler_for(&self, subscription: &Subscription) -> Option<&str> {
        self.routes
            .get(subscription.name())
            .map(|r| r.handler_id.as_str())
    }

    /// Dispatch `payload` to the handler bound to `subscription`.
    ///
    /// Handler failures are converted to a nack. Only a transport failure
    /// while settling is returned as an error.
    pub fn route(
        &self,
        subscription: &str,
        payload: &[u8],
        ack: &AckHandle,
    ) -> Result<RouteOutcome, TransportError> {
        let Some(route) = self.routes.get(subscription) else {
            warn!(
                subscription,
                message_id = %ack.message_id(),
                "No route for subscription, nacking"
            );
            return finish(ack, AckDecision::Nack, NackReason::UnknownSubscription);
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| route.handler.handle(payload, ack)));

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(NackReason::HandlerFailed(e)),
            Err(panic) => Some(NackReason::HandlerPanicked(panic_message(panic.as_ref()))),
        };

        if let Some(reason) = failure {
            error!(
                subscription,
                handler = %route.handler_id,
                message_id = %ack.message_id(),
                reason = %reason,
                "Handler failed"
            );
            return match ack.decision() {
                Some(decision) => settled_outcome(ack, decision, reason),
                None => finish(ack, AckDecision::Nack, reason),
            };
        }

        match (ack.decision(), self.ack_mode) {
            (Some(decision), _) => settled_outcome(ack, decision, NackReason::Rejected),
            (None, AckMode::Auto) => finish(ack, AckDecision::Ack, NackReason::Rejected),
            (None, AckMode::Manual) => {
                warn!(
                    subscription,
                    handler = %route.handler_id,
                    message_id = %ack.message_id(),
                    "Handler returned without settling, nacking"
                );
                finish(ack, AckDecision::Nack, NackReason::Unsettled)
            }
        }
    }
}

impl fmt::Debug for ChannelRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<_> = self
            .routes
            .iter()
            .map(|(sub, r)| (sub.as_str(), r.handler_id.as_str()))
            .collect();
        routes.sort_unstable();
        f.debug_struct("ChannelRouter")
            .field("routes", &routes)
            .field("ack_mode", &self.ack_mode)
            .finish()
    }
}

/// Settle with `decision` on behalf of the handler.
fn finish(
    ack: &AckHandle,
    decision: AckDecision,
    nack_reason: NackReason,
) -> Result<RouteOutcome, TransportError> {
    let settled = match decision {
        AckDecision::Ack => ack.ack(),
        AckDecision::Nack => ack.nack(),
    };

    match settled {
        Ok(()) => Ok(outcome_for(decision, nack_reason)),
        Err(AckError::Transport(e)) => Err(e),
        // Lost a race with the handler settling from another thread.
        Err(AckError::AlreadySettled { previous, .. }) => Ok(outcome_for(previous, nack_reason)),
    }
}

/// Outcome for a message the handler already settled.
fn settled_outcome(
    ack: &AckHandle,
    decision: AckDecision,
    nack_reason: NackReason,
) -> Result<RouteOutcome, TransportError> {
    if let Some(e) = ack.take_transport_error() {
        return Err(e);
    }
    Ok(outcome_for(decision, nack_reason))
}

fn outcome_for(decision: AckDecision, nack_reason: NackReason) -> RouteOutcome {
    match decision {
        AckDecision::Ack => RouteOutcome::Acked,
        AckDecision::Nack => RouteOutcome::Nacked(nack_reason),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
