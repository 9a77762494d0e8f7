//! # Integration Scenarios
//!
//! Each module drives the public API of `relay-core` (and `relay-runtime`
//! where a console is involved) the way a deployment would.

pub mod concurrency;
pub mod config_flow;
pub mod pause_resume;
