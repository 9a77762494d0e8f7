//! # Subscription Relay Runtime
//!
//! Entry point for the relay binary.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging, metrics)
//! 2. Load configuration: `--config` file, `RELAY_*` environment, CLI flags
//! 3. Register the built-in handlers and bootstrap the control plane
//! 4. Attach adapters to the transport and serve the console on stdin
//!
//! Any configuration or binding error aborts startup with a non-zero exit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{info, warn};

use relay_core::{AckMode, RelayConfig, DEFAULT_QUEUE_CAPACITY};
use relay_runtime::console::run_console;
use relay_runtime::handlers;
use relay_runtime::{RelayRuntime, RuntimeOptions};
use relay_telemetry::{init_telemetry, TelemetryConfig};

/// Subscription relay: routes pub/sub deliveries to handlers, with
/// operator pause/resume.
#[derive(Parser, Debug)]
#[command(name = "relay-runtime")]
#[command(about = "Routes subscription deliveries to named handlers with runtime pause/resume")]
struct Args {
    /// TOML configuration file. Without it a demo configuration is used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the acknowledgement mode (manual or auto)
    #[arg(long)]
    ack_mode: Option<String>,

    /// Log level or filter directive
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Redeliveries of a nacked message before it is dropped
    #[arg(long, default_value_t = 0)]
    max_redeliveries: u32,

    /// Deliveries queued per subscription
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

/// Load configuration from file, environment, then flags.
fn load_config(args: &Args) -> Result<RelayConfig> {
    let config = match &args.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            warn!("No --config given, using demo subscriptions");
            demo_config()
        }
    };

    let mut config = config
        .with_env_overrides()
        .context("Invalid RELAY_* environment override")?;

    if let Some(mode) = &args.ack_mode {
        config.ack_mode = mode
            .parse::<AckMode>()
            .context("Invalid --ack-mode")?;
    }

    Ok(config)
}

fn demo_config() -> RelayConfig {
    RelayConfig::new(AckMode::Manual)
        .with_subscription("orders-sub", "orders", "json")
        .with_subscription("audit-sub", "audit", "log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &args.log_level {
        telemetry = telemetry.with_log_level(level.clone());
    }
    if args.json_logs {
        telemetry = telemetry.with_json_logs(true);
    }
    let _telemetry = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = load_config(&args)?;
    let directory =
        handlers::default_directory().context("Failed to register built-in handlers")?;
    let options = RuntimeOptions {
        queue_capacity: args.queue_capacity,
        max_redeliveries: args.max_redeliveries,
    };

    let runtime = RelayRuntime::new(&config, &directory, options)?;
    runtime.start();

    info!("Relay is running. Type 'help' for commands, Ctrl+C to stop.");
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = run_console(&runtime, stdin, tokio::io::stdout()) => {
            result.context("Console failed")?;
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
        }
    }

    runtime.shutdown().await;
    Ok(())
}
