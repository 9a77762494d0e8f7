//! # Subscription Relay Test Suite
//!
//! Unified test crate for cross-crate scenarios.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Shared fixtures (ledger ack sink, counting handlers)
//! └── integration/      # End-to-end scenarios
//!     ├── config_flow.rs      # TOML file to running control plane
//!     ├── pause_resume.rs     # Pause/resume and failure isolation
//!     └── concurrency.rs      # Deliveries racing control commands
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p relay-tests
//!
//! # By category
//! cargo test -p relay-tests integration::concurrency
//!
//! # Benchmarks
//! cargo bench -p relay-tests
//! ```

#![allow(dead_code)]

pub mod integration;
pub mod support;
