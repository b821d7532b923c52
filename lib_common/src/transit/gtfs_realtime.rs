//! # GTFS-Realtime Protobuf Messages
//!
//! Rust representations of the subset of `gtfs-realtime.proto` (proto2) needed
//! to read a `VehiclePositions` feed, declared with the `prost` derive macros.
//! Fields outside this subset (trip updates, alerts, occupancy, ...) are
//! skipped by the decoder as unknown fields.

use prost::Message;

/// Root of every GTFS-Realtime payload.
#[derive(Clone, PartialEq, Message)]
pub struct FeedMessage {
    /// Metadata about the feed.
    #[prost(message, optional, tag = "1")]
    pub header: Option<FeedHeader>,

    /// The feed content, one entity per vehicle for a positions feed.
    #[prost(message, repeated, tag = "2")]
    pub entity: Vec<FeedEntity>,
}

/// Feed-level metadata.
#[derive(Clone, PartialEq, Message)]
pub struct FeedHeader {
    /// Version of the feed specification, e.g. "2.0".
    #[prost(string, required, tag = "1")]
    pub gtfs_realtime_version: String,

    /// Whether the payload is a full dataset or a differential update.
    #[prost(enumeration = "Incrementality", optional, tag = "2")]
    pub incrementality: Option<i32>,

    /// POSIX time at which the content of the feed was created.
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
}

/// Determines whether the current fetch is incremental.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Incrementality {
    /// The feed replaces everything previously known.
    FullDataset = 0,
    /// Only changed entities are present.
    Differential = 1,
}

/// One entity of the feed.
#[derive(Clone, PartialEq, Message)]
pub struct FeedEntity {
    /// Unique within the feed.
    #[prost(string, required, tag = "1")]
    pub id: String,

    /// Set in differential feeds when the entity is to be removed.
    #[prost(bool, optional, tag = "2")]
    pub is_deleted: Option<bool>,

    /// Realtime position of a vehicle.
    #[prost(message, optional, tag = "4")]
    pub vehicle: Option<VehiclePosition>,
}

/// Realtime positioning information for a given vehicle.
#[derive(Clone, PartialEq, Message)]
pub struct VehiclePosition {
    /// The trip this vehicle is serving.
    #[prost(message, optional, tag = "1")]
    pub trip: Option<TripDescriptor>,

    /// Current position of this vehicle.
    #[prost(message, optional, tag = "2")]
    pub position: Option<Position>,

    /// Index of the current stop in the trip's stop sequence.
    #[prost(uint32, optional, tag = "3")]
    pub current_stop_sequence: Option<u32>,

    /// Status with respect to the current stop.
    #[prost(enumeration = "VehicleStopStatus", optional, tag = "4")]
    pub current_status: Option<i32>,

    /// POSIX time at which the position was measured.
    #[prost(uint64, optional, tag = "5")]
    pub timestamp: Option<u64>,

    /// Identifies the current stop.
    #[prost(string, optional, tag = "7")]
    pub stop_id: Option<String>,

    /// Additional information on the vehicle.
    #[prost(message, optional, tag = "8")]
    pub vehicle: Option<VehicleDescriptor>,
}

/// A geographic position of a vehicle.
#[derive(Clone, PartialEq, Message)]
pub struct Position {
    /// Degrees North, in the WGS-84 coordinate system.
    #[prost(float, required, tag = "1")]
    pub latitude: f32,

    /// Degrees East, in the WGS-84 coordinate system.
    #[prost(float, required, tag = "2")]
    pub longitude: f32,

    /// Bearing in degrees clockwise from North.
    #[prost(float, optional, tag = "3")]
    pub bearing: Option<f32>,

    /// Odometer value in meters.
    #[prost(double, optional, tag = "4")]
    pub odometer: Option<f64>,

    /// Momentary speed in meters per second.
    #[prost(float, optional, tag = "5")]
    pub speed: Option<f32>,
}

/// Identifies an instance of a GTFS trip.
#[derive(Clone, PartialEq, Message)]
pub struct TripDescriptor {
    /// The trip_id from the static GTFS feed.
    #[prost(string, optional, tag = "1")]
    pub trip_id: Option<String>,

    /// The route_id from the static GTFS feed.
    #[prost(string, optional, tag = "5")]
    pub route_id: Option<String>,
}

/// Identification information for the vehicle performing the trip.
#[derive(Clone, PartialEq, Message)]
pub struct VehicleDescriptor {
    /// Internal system identification of the vehicle.
    #[prost(string, optional, tag = "1")]
    pub id: Option<String>,

    /// User visible label.
    #[prost(string, optional, tag = "2")]
    pub label: Option<String>,

    /// The license plate of the vehicle.
    #[prost(string, optional, tag = "3")]
    pub license_plate: Option<String>,
}

/// Where a vehicle is relative to its current stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum VehicleStopStatus {
    /// About to arrive at the stop.
    IncomingAt = 0,
    /// Standing at the stop.
    StoppedAt = 1,
    /// Departed the previous stop and in transit.
    InTransitTo = 2,
}
