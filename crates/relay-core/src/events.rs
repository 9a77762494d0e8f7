//! # Control Events
//!
//! Audit events emitted by the control plane. They are broadcast to any
//! number of listeners and serialise to JSON for audit logs.

use std::fmt;

use serde::Serialize;

use crate::control::{CommandOutcome, StateCounts};

/// Adapter state as seen by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterState {
    /// Accepting messages.
    Running,
    /// Not accepting messages.
    Stopped,
}

impl AdapterState {
    pub(crate) fn from_running(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// One audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    /// An adapter changed state because of a command.
    AdapterTransitioned {
        /// Command that caused the transition.
        command: String,
        /// Subscription served by the adapter.
        subscription: String,
        /// State before the command.
        from: AdapterState,
        /// State after the command.
        to: AdapterState,
    },

    /// A command finished.
    CommandCompleted {
        /// Command as parsed.
        command: String,
        /// Applied or ignored.
        outcome: CommandOutcome,
        /// Number of adapters that changed state.
        transitioned: usize,
        /// Adapter counts after the command.
        counts: StateCounts,
    },
}

impl ControlEvent {
    /// Event as a single JSON line.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"event":"unserializable","error":"{e}"}}"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_json() {
        let event = ControlEvent::AdapterTransitioned {
            command: "pause".to_string(),
            subscription: "sub-1".to_string(),
            from: AdapterState::Running,
            to: AdapterState::Stopped,
        };

        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["event"], "adapter_transitioned");
        assert_eq!(json["subscription"], "sub-1");
        assert_eq!(json["from"], "running");
        assert_eq!(json["to"], "stopped");
    }

    #[test]
    fn test_state_from_running() {
        assert_eq!(AdapterState::from_running(true), AdapterState::Running);
        assert_eq!(AdapterState::from_running(false), AdapterState::Stopped);
        assert_eq!(AdapterState::Stopped.to_string(), "stopped");
    }
}
