//! # Core Engine Module
//!
//! The ingestion, cache and distribution core. Everything that is shared
//! between the single polling task and the many reading or subscribed tasks
//! lives here.
//!
//! ## Core Components:
//!
//! - **`snapshot`**: `VehicleRecord` and the immutable, versioned `Snapshot`
//!   produced by one successful fetch cycle.
//!
//! - **`snapshot_store`**: a single-slot holder of the latest `Snapshot`. Reads
//!   and replacements are a single atomic pointer swap, so readers never wait
//!   behind a slow upstream fetch.
//!
//! - **`registry`**: the set of currently connected subscribers, safe to mutate
//!   while a broadcast is iterating over it.
//!
//! - **`dispatcher`**: the `Distributor`, which fans each new snapshot out to
//!   every subscriber through a bounded per-subscriber mailbox and catches new
//!   subscribers up with the current snapshot.
//!
//! - **`feed`**: the narrow `FeedSource` / `FeedDecoder` seams the poller drives.
//!
//! - **`stats`**: lock-free counters describing poll cycle outcomes.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Fan-out of snapshots to registered subscribers.
pub mod dispatcher;
/// Error taxonomy shared by the pipeline.
pub mod error;
/// Interfaces to the upstream feed source and decoder.
pub mod feed;
/// Concurrency-safe subscriber membership.
pub mod registry;
/// Vehicle records and versioned snapshots.
pub mod snapshot;
/// Single-slot, lock-free store of the latest snapshot.
pub mod snapshot_store;
/// Poll cycle counters.
pub mod stats;

// --- Public API Re-exports ---
pub use dispatcher::{Distributor, Subscription};
pub use error::{DecodeError, FetchError, PollError, SubscriberUnreachable};
pub use feed::{Decoded, FeedDecoder, FeedSource};
pub use registry::{SubscriberHandle, SubscriberId, SubscriberRegistry};
pub use snapshot::{Latest, Snapshot, VehicleRecord};
pub use snapshot_store::SnapshotStore;
pub use stats::{PollStats, PollStatsView};
