//! # Control Plane
//!
//! Process-wide coordinator owning every ingestion adapter. Applies
//! pause/resume commands to all of them and emits audit events.
//!
//! ## Startup
//!
//! ```text
//! RelayConfig ──load──→ SubscriptionRegistry ──bind──→ ChannelRouter
//!                                 │                          │
//!                                 └──── one adapter each ────┘
//!                                              │
//!                                              ▼
//!                                        ControlPlane
//! ```
//!
//! Any configuration or binding error aborts startup before a single adapter
//! exists.
//!
//! ## Commands
//!
//! | Command | Effect | Outcome |
//! |---------|--------|---------|
//! | `pause` | stop every running adapter | applied |
//! | `resume` | start every stopped adapter | applied |
//! | `status` | none | applied |
//! | anything else | none | ignored (warning) |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::adapter::IngestionAdapter;
use crate::config::RelayConfig;
use crate::directory::HandlerDirectory;
use crate::errors::RelayError;
use crate::events::{AdapterState, ControlEvent};
use crate::registry::SubscriptionRegistry;
use crate::router::ChannelRouter;
use crate::DEFAULT_EVENT_CAPACITY;

/// Command accepted by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Stop all running adapters.
    Pause,
    /// Start all stopped adapters.
    Resume,
    /// Report adapter counts.
    Status,
    /// Unrecognised input, kept verbatim.
    Unknown(String),
}

impl ControlCommand {
    /// Map free text to a command. Case-insensitive, surrounding whitespace ignored.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_lowercase().as_str() {
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "status" => Self::Status,
            _ => Self::Unknown(trimmed.to_string()),
        }
    }

    /// Command name used in logs and events.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Status => "status",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Whether a command was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "lowercase")]
pub enum CommandOutcome {
    /// The command ran.
    Applied,
    /// The command was not recognised; nothing changed.
    Ignored(String),
}

impl CommandOutcome {
    /// Whether the outcome should be reported as a warning.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }
}

/// Running/stopped adapter counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    /// Adapters accepting messages.
    pub running: usize,
    /// Adapters not accepting messages.
    pub stopped: usize,
}

/// Result of `ControlPlane::execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    /// The executed command.
    pub command: ControlCommand,
    /// Applied or ignored.
    pub outcome: CommandOutcome,
    /// Subscriptions whose adapter changed state, in registry order.
    pub transitioned: Vec<String>,
    /// Counts after the command.
    pub counts: StateCounts,
}

impl CommandReport {
    /// Human-readable confirmation for the command surface.
    #[must_use]
    pub fn confirmation(&self) -> String {
        let counts = format!(
            "running={} stopped={}",
            self.counts.running, self.counts.stopped
        );
        match (&self.command, &self.outcome) {
            (_, CommandOutcome::Ignored(reason)) => format!("warning: {reason}; {counts}"),
            (ControlCommand::Pause, _) => {
                format!("paused {} adapter(s); {counts}", self.transitioned.len())
            }
            (ControlCommand::Resume, _) => {
                format!("resumed {} adapter(s); {counts}", self.transitioned.len())
            }
            _ => format!("status: {counts}"),
        }
    }
}

/// Owns every ingestion adapter and applies control commands to them.
#[derive(Debug)]
pub struct ControlPlane {
    adapters: Vec<Arc<IngestionAdapter>>,
    by_name: HashMap<String, usize>,
    events: broadcast::Sender<ControlEvent>,
}

impl ControlPlane {
    /// Build the registry, router and one running adapter per subscription.
    ///
    /// # Errors
    ///
    /// `RelayError::Config` for invalid subscriptions, `RelayError::Bind` for
    /// unknown handlers. No adapter is created on error.
    pub fn bootstrap(config: &RelayConfig, directory: &HandlerDirectory) -> Result<Self, RelayError> {
        let registry = SubscriptionRegistry::load(config)?;
        let router = Arc::new(ChannelRouter::bind(&registry, directory, config.ack_mode)?);

        let adapters = registry
            .subscriptions()
            .iter()
            .map(|s| Arc::new(IngestionAdapter::new(s.clone(), Arc::clone(&router))))
            .collect();

        let plane = Self::new(adapters);
        info!(
            adapters = plane.adapters.len(),
            ack_mode = %config.ack_mode,
            "Control plane ready"
        );
        Ok(plane)
    }

    /// Take ownership of prebuilt adapters.
    ///
    /// Adapters must serve distinct subscriptions; a later duplicate is dropped.
    #[must_use]
    pub fn new(adapters: Vec<Arc<IngestionAdapter>>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        let mut by_name = HashMap::with_capacity(adapters.len());
        let mut owned = Vec::with_capacity(adapters.len());

        for adapter in adapters {
            if by_name.contains_key(adapter.name()) {
                warn!(subscription = adapter.name(), "Duplicate adapter ignored");
                continue;
            }
            by_name.insert(adapter.name().to_string(), owned.len());
            owned.push(adapter);
        }

        Self {
            adapters: owned,
            by_name,
            events,
        }
    }

    /// All adapters in registry order.
    #[must_use]
    pub fn adapters(&self) -> &[Arc<IngestionAdapter>] {
        &self.adapters
    }

    /// Adapter serving `subscription`.
    #[must_use]
    pub fn adapter(&self, subscription: &str) -> Option<&Arc<IngestionAdapter>> {
        self.by_name.get(subscription).map(|&i| &self.adapters[i])
    }

    /// Listen for audit events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Current running/stopped counts.
    #[must_use]
    pub fn state_counts(&self) -> StateCounts {
        let running = self.adapters.iter().filter(|a| a.is_running()).count();
        StateCounts {
            running,
            stopped: self.adapters.len() - running,
        }
    }

    /// Apply `command` to every adapter.
    ///
    /// Never fails: an unknown command is reported as `CommandOutcome::Ignored`.
    pub fn execute(&self, command: ControlCommand) -> CommandReport {
        let (outcome, transitioned) = match &command {
            ControlCommand::Pause => (CommandOutcome::Applied, self.transition(&command, false)),
            ControlCommand::Resume => (CommandOutcome::Applied, self.transition(&command, true)),
            ControlCommand::Status => (CommandOutcome::Applied, Vec::new()),
            ControlCommand::Unknown(raw) => {
                warn!(command = %raw, "Unknown control command ignored");
                (
                    CommandOutcome::Ignored(format!(
                        "unknown command '{raw}', expected pause|resume|status"
                    )),
                    Vec::new(),
                )
            }
        };

        let counts = self.state_counts();
        info!(
            command = command.name(),
            transitioned = transitioned.len(),
            running = counts.running,
            stopped = counts.stopped,
            "Control command completed"
        );
        self.emit(ControlEvent::CommandCompleted {
            command: command.name().to_string(),
            outcome: outcome.clone(),
            transitioned: transitioned.len(),
            counts,
        });

        CommandReport {
            command,
            outcome,
            transitioned,
            counts,
        }
    }

    /// Move every adapter not already in the target state. The adapter's own
    /// `start`/`stop` decides under its lock whether a transition happened,
    /// so concurrent commands never double-count an adapter.
    fn transition(&self, command: &ControlCommand, to_running: bool) -> Vec<String> {
        let mut transitioned = Vec::new();

        for adapter in &self.adapters {
            if adapter.is_running() == to_running {
                continue;
            }
            let changed = if to_running {
                adapter.start()
            } else {
                adapter.stop()
            };
            if !changed {
                continue;
            }

            self.emit(ControlEvent::AdapterTransitioned {
                command: command.name().to_string(),
                subscription: adapter.name().to_string(),
                from: AdapterState::from_running(!to_running),
                to: AdapterState::from_running(to_running),
            });
            transitioned.push(adapter.name().to_string());
        }

        transitioned
    }

    fn emit(&self, event: ControlEvent) {
        // No listeners is fine; the tracing log is the primary audit trail.
        let _ = self.events.send(event);
    }
}
