use lib_common::core::{PollStatsView, Snapshot};
use serde::Serialize;

/// One push frame: the snapshot fields flattened next to the event type.
#[derive(Debug, Serialize)]
pub struct ServerMessage<'a> {
    pub r#type: &'static str,
    #[serde(flatten)]
    pub snapshot: &'a Snapshot,
}

impl<'a> ServerMessage<'a> {
    pub fn vehicle_update(snapshot: &'a Snapshot) -> Self {
        Self {
            r#type: "vehicle_update",
            snapshot,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub poll: PollStatsView,
    pub subscribers: usize,
    pub sequence: u64,
}
