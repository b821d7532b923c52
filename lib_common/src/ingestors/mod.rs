//! # Data Ingestors Module
//!
//! Ingestors are the front door for external data: they own the timing and
//! failure policy of talking to an upstream and hand normalized results to the
//! core.
//!
//! ## Contained Modules:
//! - **`gtfs_polling`**: the interval-driven, single-flight `Poller` that turns
//!   a polled feed into versioned snapshots.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The interval-driven feed poller.
pub mod gtfs_polling;

// --- Public API Re-exports ---
pub use gtfs_polling::{ConfigError, CycleOutcome, Poller, PollerConfig};
