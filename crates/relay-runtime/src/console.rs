//! # Operator Console
//!
//! Line-oriented command surface. Each line is one command; the reply is
//! written back as text.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `pause` | stop every adapter |
//! | `resume` | start every adapter |
//! | `status` | counts plus one line per adapter |
//! | `publish <subscription> <payload>` | queue a message on the transport |
//! | `metrics` | Prometheus text exposition |
//! | `help` | this table |
//! | `quit` / `exit` | leave the console |
//!
//! Anything else is passed to the control plane, which reports it as an
//! unknown command and changes nothing.

use relay_core::ControlCommand;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::RelayRuntime;

const HELP: &str = "\
commands:
  pause                              stop accepting messages on every subscription
  resume                             accept messages again
  status                             adapter counts and per-subscription state
  publish <subscription> <payload>   queue a message
  metrics                            prometheus metrics
  help                               this text
  quit                               exit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Forwarded to the control plane.
    Control(ControlCommand),
    /// Queue `payload` for `subscription`.
    Publish {
        /// Target subscription.
        subscription: String,
        /// Message body, sent as UTF-8 bytes.
        payload: String,
    },
    /// Dump metrics.
    Metrics,
    /// Show help.
    Help,
    /// Leave the console.
    Quit,
    /// Recognised command used incorrectly.
    Usage(&'static str),
}

impl ConsoleCommand {
    /// Parse one line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let command = match head.to_lowercase().as_str() {
            "publish" => match rest.split_once(char::is_whitespace) {
                Some((subscription, payload)) => Self::Publish {
                    subscription: subscription.to_string(),
                    payload: payload.trim().to_string(),
                },
                None => Self::Usage("usage: publish <subscription> <payload>"),
            },
            "metrics" if rest.is_empty() => Self::Metrics,
            "help" if rest.is_empty() => Self::Help,
            "quit" | "exit" if rest.is_empty() => Self::Quit,
            _ => Self::Control(ControlCommand::parse(line)),
        };
        Some(command)
    }
}

/// What the console loop should do after a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    /// Print the reply and keep reading.
    Reply(String),
    /// Stop reading.
    Quit,
}

/// Execute one console line against the runtime.
pub fn handle_line(runtime: &RelayRuntime, line: &str) -> Option<ConsoleAction> {
    let command = ConsoleCommand::parse(line)?;
    debug!(?command, "Console command");

    let reply = match command {
        ConsoleCommand::Control(control) => {
            let show_adapters = control == ControlCommand::Status;
            let report = runtime.execute(control);
            let mut reply = report.confirmation();
            if show_adapters {
                for status in runtime.status_lines() {
                    reply.push_str("\n  ");
                    reply.push_str(&status);
                }
            }
            reply
        }
        ConsoleCommand::Publish {
            subscription,
            payload,
        } => match runtime.publish(&subscription, payload.into_bytes()) {
            Ok(message_id) => format!("published {message_id} to {subscription}"),
            Err(e) => format!("error: {e}"),
        },
        ConsoleCommand::Metrics => match relay_telemetry::encode_metrics() {
            Ok(text) => text.trim_end().to_string(),
            Err(e) => format!("error: {e}"),
        },
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Usage(usage) => usage.to_string(),
        ConsoleCommand::Quit => return Some(ConsoleAction::Quit),
    };
    Some(ConsoleAction::Reply(reply))
}

/// Read commands from `reader` until EOF or `quit`, writing replies.
pub async fn run_console<R, W>(runtime: &RelayRuntime, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match handle_line(runtime, &line) {
            Some(ConsoleAction::Reply(reply)) => {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Some(ConsoleAction::Quit) => break,
            None => {}
        }
    }
    Ok(())
}
