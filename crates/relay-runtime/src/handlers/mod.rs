//! # Message Handlers
//!
//! Handlers the runtime registers by name. Configuration files reference
//! them through the `handler` field of each subscription.
//!
//! | Name | Behaviour |
//! |------|-----------|
//! | `log` | log the payload, ack |
//! | `json` | ack valid JSON, fail (nack) anything else |
//! | `reject` | nack |

pub mod builtin;

pub use builtin::{JsonHandler, LogHandler, RejectHandler, Timed};

use relay_core::{BindError, HandlerDirectory};

/// Directory holding every built-in handler, each timed under its own name.
pub fn default_directory() -> Result<HandlerDirectory, BindError> {
    let mut directory = HandlerDirectory::new();
    directory.register("log", Timed::new("log", LogHandler))?;
    directory.register("json", Timed::new("json", JsonHandler))?;
    directory.register("reject", Timed::new("reject", RejectHandler))?;
    Ok(directory)
}
