//! # Handler Directory
//!
//! Maps handler ids to message-processing capabilities. Populated at startup,
//! read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::ack::AckHandle;
use crate::errors::{BindError, HandlerError};

/// Processes one delivered message.
///
/// A handler is expected to call exactly one of `ack.ack()` / `ack.nack()`
/// before returning, or to return an error, which the router turns into a
/// nack.
pub trait MessageHandler: Send + Sync {
    /// Handle `payload`, settling it through `ack`.
    fn handle(&self, payload: &[u8], ack: &AckHandle) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&[u8], &AckHandle) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, payload: &[u8], ack: &AckHandle) -> Result<(), HandlerError> {
        self(payload, ack)
    }
}

/// Build a handler from a closure, letting the compiler infer its signature.
///
/// ```rust,ignore
/// directory.register("log", handler_fn(|payload, ack| {
///     tracing::info!(len = payload.len(), "received");
///     ack.ack().map_err(|e| HandlerError::failed(e.to_string()))
/// }))?;
/// ```
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&[u8], &AckHandle) -> Result<(), HandlerError> + Send + Sync,
{
    f
}

/// Registered handlers keyed by id.
#[derive(Default, Clone)]
pub struct HandlerDirectory {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerDirectory {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `handler_id`.
    ///
    /// # Errors
    ///
    /// `BindError::DuplicateHandler` if the id is already taken.
    pub fn register<H>(&mut self, handler_id: impl Into<String>, handler: H) -> Result<(), BindError>
    where
        H: MessageHandler + 'static,
    {
        self.register_arc(handler_id, Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn register_arc(
        &mut self,
        handler_id: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BindError> {
        let handler_id = handler_id.into();
        if self.handlers.contains_key(&handler_id) {
            return Err(BindError::DuplicateHandler(handler_id));
        }
        debug!(handler = %handler_id, "Handler registered");
        self.handlers.insert(handler_id, handler);
        Ok(())
    }

    /// Look up a handler without invoking it.
    ///
    /// # Errors
    ///
    /// `BindError::UnknownHandler` if nothing is registered under `handler_id`.
    pub fn resolve(&self, handler_id: &str) -> Result<Arc<dyn MessageHandler>, BindError> {
        self.handlers
            .get(handler_id)
            .cloned()
            .ok_or_else(|| BindError::UnknownHandler {
                handler: handler_id.to_string(),
                subscription: String::new(),
            })
    }

    /// Whether `handler_id` is registered.
    #[must_use]
    pub fn contains(&self, handler_id: &str) -> bool {
        self.handlers.contains_key(handler_id)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().collect();
        ids.sort();
        f.debug_struct("HandlerDirectory").field("handlers", &ids).finish()
    }
}
