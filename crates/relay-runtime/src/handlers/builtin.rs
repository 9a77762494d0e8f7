//! Built-in handlers available to every relay configuration.

use relay_core::{AckHandle, HandlerError, MessageHandler};
use relay_telemetry::HistogramTimer;
use tracing::{debug, info};

/// Longest payload preview written to the log.
const PREVIEW_BYTES: usize = 120;

/// Logs the payload and acks it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl MessageHandler for LogHandler {
    fn handle(&self, payload: &[u8], ack: &AckHandle) -> Result<(), HandlerError> {
        let shown = &payload[..payload.len().min(PREVIEW_BYTES)];
        info!(
            message_id = %ack.message_id(),
            bytes = payload.len(),
            payload = %String::from_utf8_lossy(shown),
            "Message received"
        );
        ack.ack()?;
        Ok(())
    }
}

/// Acks payloads that parse as JSON, fails the rest.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHandler;

impl MessageHandler for JsonHandler {
    fn handle(&self, payload: &[u8], ack: &AckHandle) -> Result<(), HandlerError> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| HandlerError::Decode(e.to_string()))?;

        debug!(
            message_id = %ack.message_id(),
            kind = json_kind(&value),
            "JSON payload decoded"
        );
        ack.ack()?;
        Ok(())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Nacks every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectHandler;

impl MessageHandler for RejectHandler {
    fn handle(&self, _payload: &[u8], ack: &AckHandle) -> Result<(), HandlerError> {
        ack.nack()?;
        Ok(())
    }
}

/// Records the wrapped handler's run time in the handler duration histogram.
#[derive(Debug, Clone)]
pub struct Timed<H> {
    name: String,
    inner: H,
}

impl<H> Timed<H> {
    /// Wrap `inner`, labelling its samples with `name`.
    pub fn new(name: impl Into<String>, inner: H) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl<H: MessageHandler> MessageHandler for Timed<H> {
    fn handle(&self, payload: &[u8], ack: &AckHandle) -> Result<(), HandlerError> {
        let _timer = HistogramTimer::for_handler(&self.name);
        self.inner.handle(payload, ack)
    }
}
