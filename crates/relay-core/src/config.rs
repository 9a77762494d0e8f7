//! # Relay Configuration
//!
//! Subscription definitions and the global acknowledgement mode.
//!
//! ## Config File Format
//!
//! ```toml
//! ack_mode = "manual"
//!
//! [[subscriptions]]
//! name = "sub-1"
//! topic = "orders"
//! handler = "h1"
//!
//! [[subscriptions]]
//! name = "sub-2"
//! topic = "invoices"
//! handler = "h2"
//! ```
//!
//! Entries are kept raw (every field optional) so that missing fields are
//! reported by `SubscriptionRegistry::load` as `ConfigError::MissingField`
//! with the entry position, rather than as an opaque parse failure.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// How the router treats messages a handler did not settle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// Handlers must ack/nack; returning without settling is logged and nacked.
    #[default]
    Manual,
    /// The router acks on success and nacks on failure when the handler did not settle.
    Auto,
}

impl FromStr for AckMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            other => Err(ConfigError::InvalidAckMode(other.to_string())),
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// One `[[subscriptions]]` entry as written in the config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Unique subscription name.
    #[serde(default)]
    pub name: Option<String>,
    /// Topic the subscription is attached to.
    #[serde(default)]
    pub topic: Option<String>,
    /// Handler id that processes this subscription's messages.
    #[serde(default)]
    pub handler: Option<String>,
}

impl SubscriptionConfig {
    /// Entry with every field present.
    pub fn new(name: impl Into<String>, topic: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            topic: Some(topic.into()),
            handler: Some(handler.into()),
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Global acknowledgement mode.
    #[serde(default)]
    pub ack_mode: AckMode,
    /// Ordered subscription entries.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl RelayConfig {
    /// Empty configuration with the given ack mode.
    #[must_use]
    pub fn new(ack_mode: AckMode) -> Self {
        Self {
            ack_mode,
            subscriptions: Vec::new(),
        }
    }

    /// Append a subscription entry.
    #[must_use]
    pub fn with_subscription(
        mut self,
        name: impl Into<String>,
        topic: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        self.subscriptions
            .push(SubscriptionConfig::new(name, topic, handler));
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment overrides.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_ACK_MODE`: `manual` or `auto`
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(mode) = env::var("RELAY_ACK_MODE") {
            self.ack_mode = mode.parse()?;
        }
        Ok(self)
    }
}
