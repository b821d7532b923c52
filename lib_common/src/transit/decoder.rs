//! GTFS-Realtime `VehiclePositions` decoder.

use prost::Message;

use crate::core::error::DecodeError;
use crate::core::feed::{Decoded, FeedDecoder};
use crate::core::snapshot::VehicleRecord;

use super::gtfs_realtime::FeedMessage;

/// Decodes a `FeedMessage` into one record per entity carrying a vehicle
/// position. The record id is the entity id.
///
/// Entities without a position are skipped rather than placed at (0, 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct GtfsRealtimeDecoder;

impl GtfsRealtimeDecoder {
    /// Creates the decoder.
    pub fn new() -> Self {
        Self
    }
}

impl FeedDecoder for GtfsRealtimeDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        let feed = FeedMessage::decode(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let mut records = Vec::with_capacity(feed.entity.len());
        for entity in feed.entity {
            if entity.is_deleted == Some(true) {
                continue;
            }
            let Some(position) = entity.vehicle.and_then(|v| v.position) else {
                continue;
            };
            let (latitude, longitude) = (f64::from(position.latitude), f64::from(position.longitude));
            if !latitude.is_finite() || !longitude.is_finite() {
                log::debug!("Skipping entity {} with non-finite position", entity.id);
                continue;
            }
            records.push(VehicleRecord::new(entity.id, latitude, longitude));
        }

        Ok(Decoded {
            records,
            feed_timestamp: feed.header.and_then(|h| h.timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transit::gtfs_realtime::{FeedEntity, FeedHeader, Position, VehicleDescriptor, VehiclePosition};

    fn entity(id: &str, position: Option<(f32, f32)>) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            is_deleted: None,
            vehicle: Some(VehiclePosition {
                position: position.map(|(latitude, longitude)| Position {
                    latitude,
                    longitude,
                    ..Default::default()
                }),
                vehicle: Some(VehicleDescriptor {
                    label: Some(format!("bus {id}")),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    fn encode(entities: Vec<FeedEntity>) -> Vec<u8> {
        FeedMessage {
            header: Some(FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: None,
                timestamp: Some(1_700_000_000),
            }),
            entity: entities,
        }
        .encode_to_vec()
    }

    #[test]
    fn decodes_vehicle_positions_in_feed_order() {
        let bytes = encode(vec![
            entity("v1", Some((28.61, 77.20))),
            entity("v2", Some((28.55, 77.10))),
            entity("v3", Some((28.70, 77.05))),
        ]);

        let decoded = GtfsRealtimeDecoder::new().decode(&bytes).unwrap();
        let ids: Vec<_> = decoded.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["v1", "v2", "v3"]);
        assert_eq!(decoded.records[0].latitude, f64::from(28.61_f32));
        assert_eq!(decoded.feed_timestamp, Some(1_700_000_000));
    }

    #[test]
    fn skips_entities_without_a_position() {
        let mut deleted = entity("gone", Some((1.0, 1.0)));
        deleted.is_deleted = Some(true);
        let bare = FeedEntity {
            id: "alert-only".to_string(),
            is_deleted: None,
            vehicle: None,
        };
        let bytes = encode(vec![entity("v1", None), bare, deleted, entity("v2", Some((1.0, 2.0)))]);

        let decoded = GtfsRealtimeDecoder::new().decode(&bytes).unwrap();
        assert_eq!(decoded.records, vec![VehicleRecord::new("v2", 1.0, 2.0)]);
        assert!(decoded.records.iter().all(|r| (r.latitude, r.longitude) != (0.0, 0.0)));
    }

    #[test]
    fn skips_non_finite_coordinates() {
        let bytes = encode(vec![entity("v1", Some((f32::NAN, 77.0))), entity("v2", Some((28.0, f32::INFINITY)))]);
        assert!(GtfsRealtimeDecoder::new().decode(&bytes).unwrap().records.is_empty());
    }

    #[test]
    fn keeps_duplicate_entities_for_the_snapshot_to_resolve() {
        let bytes = encode(vec![entity("v1", Some((1.0, 1.0))), entity("v1", Some((2.0, 2.0)))]);
        let decoded = GtfsRealtimeDecoder::new().decode(&bytes).unwrap();
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.records[1].latitude, 2.0);
    }

    #[test]
    fn empty_payload_is_an_empty_feed() {
        let decoded = GtfsRealtimeDecoder::new().decode(&[]).unwrap();
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.feed_timestamp, None);
    }

    #[test]
    fn garbage_is_malformed() {
        let err = GtfsRealtimeDecoder::new().decode(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
