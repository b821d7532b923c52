//! Seams between the poller and the outside world.

use async_trait::async_trait;
use bytes::Bytes;

use super::error::{DecodeError, FetchError};
use super::snapshot::VehicleRecord;

/// Produces the raw bytes of the current upstream feed.
///
/// Implementations carry their own credentials. The poller bounds every call
/// with its own timeout, so an implementation may block for as long as its
/// transport allows.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetches the current feed payload.
    async fn fetch(&self) -> Result<Bytes, FetchError>;
}

/// Turns a raw payload into vehicle records.
pub trait FeedDecoder: Send + Sync {
    /// Decodes `bytes` into records in feed order. Records may repeat an id;
    /// the snapshot keeps the last one.
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError>;
}

/// Output of a successful decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// Records in feed order.
    pub records: Vec<VehicleRecord>,
    /// Feed-level timestamp, if the payload carries one.
    pub feed_timestamp: Option<u64>,
}

impl From<Vec<VehicleRecord>> for Decoded {
    fn from(records: Vec<VehicleRecord>) -> Self {
        Self {
            records,
            feed_timestamp: None,
        }
    }
}
