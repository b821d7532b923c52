//! # lib_common
//!
//! Building blocks for serving live transit vehicle positions: a polling
//! ingestor that turns a GTFS-Realtime feed into immutable, versioned
//! snapshots, a lock-free single-slot store holding the latest one, and a
//! dispatcher that pushes every new snapshot to an open set of subscribers.
//!
//! Modules are gated by folder-named features; `full` (the default) enables
//! all of them.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Snapshot model, store, subscriber registry and fan-out dispatcher.
#[cfg(feature = "core")]
pub mod core;

/// Interval-driven ingestors feeding the core.
#[cfg(feature = "ingestors")]
pub mod ingestors;

/// HTTP retrieval with retry middleware.
#[cfg(feature = "retrieve")]
pub mod retrieve;

/// GTFS-Realtime decoding and the HTTP feed source.
#[cfg(feature = "transit")]
pub mod transit;
