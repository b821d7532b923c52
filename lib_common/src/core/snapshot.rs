//! # Snapshot Model
//!
//! A `Snapshot` is the normalized result of one successful fetch and decode
//! cycle. It is created once by the poller, shared as `Arc<Snapshot>` and never
//! mutated afterwards; the next successful cycle supersedes it with a new value.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// One observed vehicle at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRecord {
    /// Opaque identifier, unique within a snapshot.
    pub id: String,
    /// WGS84 latitude in degrees.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// WGS84 longitude in degrees.
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl VehicleRecord {
    /// Creates a record from an id and a coordinate pair.
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
        }
    }
}

/// An immutable, versioned set of vehicle records from a single fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Records in decode order, one per vehicle id.
    pub records: Vec<VehicleRecord>,
    /// When the decode of this cycle completed.
    pub fetched_at: DateTime<Utc>,
    /// Strictly increasing per successful cycle, starting at 1.
    pub sequence: u64,
    /// POSIX timestamp from the feed header, when the feed carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_timestamp: Option<u64>,
}

impl Snapshot {
    /// Builds a snapshot, collapsing records that share an id.
    ///
    /// A later record with an already seen id replaces the earlier one in place,
    /// so the last writer in decode order wins while the position of the first
    /// occurrence keeps the ordering reproducible.
    pub fn new(
        records: Vec<VehicleRecord>,
        sequence: u64,
        fetched_at: DateTime<Utc>,
        feed_timestamp: Option<u64>,
    ) -> Self {
        Self {
            records: dedup_last_wins(records),
            fetched_at,
            sequence,
            feed_timestamp,
        }
    }

    /// Number of vehicles in the snapshot.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the cycle decoded zero vehicles.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks a vehicle up by id.
    pub fn get(&self, id: &str) -> Option<&VehicleRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

fn dedup_last_wins(records: Vec<VehicleRecord>) -> Vec<VehicleRecord> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<VehicleRecord> = Vec::with_capacity(records.len());

    for record in records {
        match index.get(&record.id) {
            Some(&slot) => out[slot] = record,
            None => {
                index.insert(record.id.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Pull-side view of the store: either the latest snapshot or the explicit
/// "no successful fetch yet" state.
#[derive(Debug, Clone, PartialEq)]
pub enum Latest {
    /// At least one cycle succeeded.
    Ready(Arc<Snapshot>),
    /// No cycle has succeeded since process start.
    NoDataYet,
}

impl Latest {
    /// The snapshot, if any.
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Latest::Ready(snapshot) => Some(snapshot),
            Latest::NoDataYet => None,
        }
    }
}

impl From<Option<Arc<Snapshot>>> for Latest {
    fn from(value: Option<Arc<Snapshot>>) -> Self {
        value.map_or(Latest::NoDataYet, Latest::Ready)
    }
}

#[derive(Serialize)]
struct NoDataYetBody {
    status: &'static str,
}

impl Serialize for Latest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Latest::Ready(snapshot) => snapshot.serialize(serializer),
            Latest::NoDataYet => NoDataYetBody {
                status: "no-data-yet",
            }
            .serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_keep_the_later_coordinates() {
        let snapshot = Snapshot::new(
            vec![
                VehicleRecord::new("v1", 28.61, 77.20),
                VehicleRecord::new("v2", 28.50, 77.10),
                VehicleRecord::new("v1", 28.70, 77.30),
            ],
            1,
            Utc::now(),
            None,
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.records[0], VehicleRecord::new("v1", 28.70, 77.30));
        assert_eq!(snapshot.records[1].id, "v2");
    }

    #[test]
    fn serializes_with_the_api_field_names() {
        let fetched_at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let snapshot = Snapshot::new(vec![VehicleRecord::new("v1", 1.5, 2.5)], 7, fetched_at, None);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["sequence"], 7);
        assert_eq!(value["records"][0]["lat"], 1.5);
        assert_eq!(value["records"][0]["lon"], 2.5);
        assert_eq!(value["fetchedAt"], "2024-05-01T10:00:00Z");
        assert!(value.get("feedTimestamp").is_none());
    }

    #[test]
    fn no_data_yet_has_a_status_body() {
        let value = serde_json::to_value(Latest::NoDataYet).unwrap();
        assert_eq!(value, serde_json::json!({ "status": "no-data-yet" }));
        assert!(Latest::from(None).snapshot().is_none());
    }
}
