//! # Snapshot Store
//!
//! Single-writer, many-reader slot for the latest `Snapshot`. The slot holds an
//! `Arc<Snapshot>` behind an `ArcSwapOption`, so `replace` and `current` are
//! both one atomic pointer operation: a reader sees either the previous
//! snapshot or the new one in full, and never waits on the writer.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::snapshot::{Latest, Snapshot};

/// Holds the most recently installed snapshot.
#[derive(Default)]
pub struct SnapshotStore {
    slot: ArcSwapOption<Snapshot>,
}

impl SnapshotStore {
    /// An empty store; `current` returns `None` until the first `replace`.
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::const_empty(),
        }
    }

    /// Installs `snapshot` as current. Only the poller calls this.
    pub fn replace(&self, snapshot: Arc<Snapshot>) {
        let sequence = snapshot.sequence;
        if let Some(previous) = self.slot.swap(Some(snapshot)) {
            debug_assert!(previous.sequence < sequence, "snapshot sequence went backwards");
        }
    }

    /// The latest snapshot, or `None` if no cycle has succeeded yet.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.slot.load_full()
    }

    /// Pull-contract view of `current`.
    pub fn latest(&self) -> Latest {
        self.current().into()
    }

    /// Sequence of the current snapshot, 0 when empty.
    pub fn sequence(&self) -> u64 {
        self.slot.load().as_ref().map_or(0, |s| s.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::VehicleRecord;
    use chrono::Utc;

    fn snapshot(sequence: u64) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(
            vec![VehicleRecord::new("v1", 28.6, 77.2)],
            sequence,
            Utc::now(),
            None,
        ))
    }

    #[test]
    fn empty_until_first_replace() {
        let store = SnapshotStore::new();
        assert!(store.current().is_none());
        assert_eq!(store.latest(), Latest::NoDataYet);
        assert_eq!(store.sequence(), 0);

        store.replace(snapshot(1));
        assert_eq!(store.sequence(), 1);
    }

    #[test]
    fn repeated_reads_return_the_same_snapshot() {
        let store = SnapshotStore::new();
        store.replace(snapshot(1));

        let first = store.current().unwrap();
        let second = store.current().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            serde_json::to_string(&store.latest()).unwrap(),
            serde_json::to_string(&store.latest()).unwrap()
        );
    }

    #[test]
    fn readers_see_whole_snapshots_under_concurrent_replace() {
        let store = Arc::new(SnapshotStore::new());
        store.replace(snapshot(1));

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..10_000 {
                    let current = store.current().unwrap();
                    assert!(current.sequence >= last);
                    assert_eq!(current.records.len(), 1);
                    last = current.sequence;
                }
            })
        };

        for sequence in 2..=500 {
            store.replace(snapshot(sequence));
        }
        reader.join().unwrap();
        assert_eq!(store.sequence(), 500);
    }
}
