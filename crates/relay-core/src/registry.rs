//! # Subscription Registry
//!
//! Validated, ordered, read-only set of subscriptions built once at startup.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::config::RelayConfig;
use crate::errors::ConfigError;

/// A named channel of inbound messages bound to one topic and one handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Subscription {
    name: String,
    topic: String,
    handler_id: String,
}

impl Subscription {
    /// Create a subscription.
    pub fn new(name: impl Into<String>, topic: impl Into<String>, handler_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            handler_id: handler_id.into(),
        }
    }

    /// Unique subscription name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic the subscription reads from.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Id of the handler bound to this subscription.
    #[must_use]
    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }
}

/// Ordered collection of unique subscriptions.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    subscriptions: Vec<Subscription>,
    by_name: HashMap<String, usize>,
}

impl SubscriptionRegistry {
    /// Validate the configuration and build the registry.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingField` if an entry has no `name` or `handler`
    /// - `ConfigError::DuplicateSubscription` if two entries share a name
    pub fn load(config: &RelayConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::default();

        for (index, entry) in config.subscriptions.iter().enumerate() {
            let name = required(entry.name.as_deref(), index, "name")?;
            let handler = required(entry.handler.as_deref(), index, "handler")?;
            let topic = entry
                .topic
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(name);

            if registry.by_name.contains_key(name) {
                return Err(ConfigError::DuplicateSubscription(name.to_string()));
            }

            debug!(subscription = name, topic, handler, "Subscription loaded");
            registry
                .by_name
                .insert(name.to_string(), registry.subscriptions.len());
            registry
                .subscriptions
                .push(Subscription::new(name, topic, handler));
        }

        Ok(registry)
    }

    /// Subscriptions in configuration order.
    #[must_use]
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Look up a subscription by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Subscription> {
        self.by_name.get(name).map(|&i| &self.subscriptions[i])
    }

    /// Number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

fn required<'a>(value: Option<&'a str>, index: usize, field: &'static str) -> Result<&'a str, ConfigError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingField { index, field })
}
