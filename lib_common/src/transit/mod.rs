//! # Transit Feed Module
//!
//! Concrete collaborators of the core for a GTFS-Realtime `VehiclePositions`
//! feed: the `prost` message definitions, a `FeedDecoder` over them and an HTTP
//! `FeedSource`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// `FeedDecoder` for GTFS-Realtime vehicle positions.
pub mod decoder;
/// `prost` definitions of the GTFS-Realtime messages in use.
pub mod gtfs_realtime;
/// `FeedSource` over HTTP with an API key.
pub mod source;

pub use decoder::GtfsRealtimeDecoder;
pub use gtfs_realtime::FeedMessage;
pub use source::HttpFeedSource;
