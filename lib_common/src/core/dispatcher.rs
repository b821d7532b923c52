//! # Snapshot Distributor
//!
//! Fans each newly installed snapshot out to every registered subscriber.
//!
//! ## Delivery model:
//!
//! 1.  **Zero-copy fan-out**: a snapshot is shared as `Arc<Snapshot>`; each
//!     subscriber receives a pointer to the same allocation.
//!
//! 2.  **Bounded, non-blocking handoff**: every subscriber owns a bounded
//!     outbox and delivery uses `try_send`. A subscriber whose outbox is full or
//!     whose receiver is gone is removed from the registry instead of stalling
//!     the broadcast or the poller behind it.
//!
//! 3.  **Catch-up on join**: a new subscriber immediately receives the current
//!     snapshot, if there is one, so nobody waits a full poll interval for data.
//!
//! 4.  **Monotonic per subscriber**: offers carry the snapshot sequence and each
//!     subscriber refuses anything not newer than what it already holds, so a
//!     catch-up racing a broadcast cannot reorder deliveries.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError};

use super::error::SubscriberUnreachable;
use super::registry::{SubscriberHandle, SubscriberId, SubscriberRegistry};
use super::snapshot::Snapshot;
use super::snapshot_store::SnapshotStore;

/// Default outbox size per subscriber.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 16;

/// Receiving end of one subscriber's outbox.
///
/// Dropping it is enough to leave: the next broadcast finds the outbox closed
/// and removes the member. `Distributor::unsubscribe` does the same eagerly.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<Snapshot>>,
}

impl Subscription {
    /// The id assigned at registration.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next snapshot. `None` once the subscriber was removed and
    /// the outbox is drained.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.recv().await
    }

    /// Takes a queued snapshot without waiting.
    pub fn try_recv(&mut self) -> Result<Arc<Snapshot>, TryRecvError> {
        self.rx.try_recv()
    }
}

/// Pushes snapshot changes to the subscriber registry.
pub struct Distributor {
    store: Arc<SnapshotStore>,
    registry: Arc<SubscriberRegistry>,
    outbox_capacity: usize,
}

impl Distributor {
    /// Creates a distributor reading catch-up data from `store`.
    pub fn new(store: Arc<SnapshotStore>, registry: Arc<SubscriberRegistry>, outbox_capacity: usize) -> Self {
        Self {
            store,
            registry,
            outbox_capacity: outbox_capacity.max(1),
        }
    }

    /// The registry this distributor broadcasts to.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Registers a new subscriber and sends it the current snapshot, if any.
    pub fn subscribe(&self) -> Subscription {
        let id = self.registry.next_id();
        let (handle, rx) = SubscriberHandle::new(id, self.outbox_capacity);
        self.registry.add(Arc::new(handle));
        self.on_subscriber_joined(id);
        log::info!("Subscriber {} joined ({} connected)", id, self.registry.len());
        Subscription { id, rx }
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            log::info!("Subscriber {} left ({} connected)", id, self.registry.len());
        }
        removed
    }

    /// Sends the current snapshot to a freshly registered subscriber.
    ///
    /// Returns `true` if a snapshot was queued. With no data yet nothing is
    /// sent; the first broadcast will reach the subscriber instead.
    pub fn on_subscriber_joined(&self, id: SubscriberId) -> bool {
        let (Some(handle), Some(snapshot)) = (self.registry.get(id), self.store.current()) else {
            return false;
        };
        match handle.offer(&snapshot) {
            Ok(sent) => sent,
            Err(unreachable) => {
                self.drop_unreachable(unreachable);
                false
            }
        }
    }

    /// Broadcasts `snapshot` to every current member.
    ///
    /// Membership is copied once at the start; members added meanwhile are
    /// covered by their own catch-up. Unreachable members are removed.
    /// Returns how many subscribers had the snapshot queued.
    pub fn on_snapshot_changed(&self, snapshot: &Arc<Snapshot>) -> usize {
        let members = self.registry.members();
        let mut delivered = 0;

        for member in &members {
            match member.offer(snapshot) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(unreachable) => self.drop_unreachable(unreachable),
            }
        }

        log::debug!(
            "Broadcast sequence {} ({} vehicles) to {}/{} subscribers",
            snapshot.sequence,
            snapshot.len(),
            delivered,
            members.len()
        );
        delivered
    }

    fn drop_unreachable(&self, unreachable: SubscriberUnreachable) {
        if self.registry.remove(unreachable.id) {
            log::warn!("Dropping {}", unreachable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::VehicleRecord;
    use chrono::Utc;

    fn snapshot(sequence: u64, ids: &[&str]) -> Arc<Snapshot> {
        let records = ids.iter().map(|id| VehicleRecord::new(*id, 28.6, 77.2)).collect();
        Arc::new(Snapshot::new(records, sequence, Utc::now(), None))
    }

    fn distributor(capacity: usize) -> (Arc<SnapshotStore>, Distributor) {
        let store = Arc::new(SnapshotStore::new());
        let registry = Arc::new(SubscriberRegistry::new());
        let distributor = Distributor::new(Arc::clone(&store), registry, capacity);
        (store, distributor)
    }

    #[test]
    fn join_without_data_receives_nothing_until_first_broadcast() {
        let (store, distributor) = distributor(4);
        let mut sub = distributor.subscribe();
        assert!(sub.try_recv().is_err());

        let first = snapshot(1, &["v1"]);
        store.replace(Arc::clone(&first));
        assert_eq!(distributor.on_snapshot_changed(&first), 1);

        assert_eq!(sub.try_recv().unwrap().sequence, 1);
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn join_catches_up_with_the_current_snapshot() {
        let (store, distributor) = distributor(4);
        let current = snapshot(5, &["v1", "v2"]);
        store.replace(Arc::clone(&current));

        let mut sub = distributor.subscribe();
        let received = sub.try_recv().unwrap();
        assert!(Arc::ptr_eq(&received, &current));

        let next = snapshot(6, &["v1"]);
        store.replace(Arc::clone(&next));
        distributor.on_snapshot_changed(&next);
        assert_eq!(sub.try_recv().unwrap().sequence, 6);
    }

    #[test]
    fn broadcast_reaches_every_member() {
        let (_store, distributor) = distributor(4);
        let mut subs: Vec<_> = (0..3).map(|_| distributor.subscribe()).collect();

        assert_eq!(distributor.on_snapshot_changed(&snapshot(1, &[])), 3);
        for sub in &mut subs {
            let received = sub.try_recv().unwrap();
            assert_eq!(received.sequence, 1);
            assert!(received.is_empty());
        }
    }

    #[test]
    fn slow_subscriber_is_dropped_without_affecting_others() {
        let (_store, distributor) = distributor(1);
        let mut fast = distributor.subscribe();
        let slow = distributor.subscribe();

        distributor.on_snapshot_changed(&snapshot(1, &["v1"]));
        assert_eq!(fast.try_recv().unwrap().sequence, 1);

        // `slow` never drains, its single slot is still occupied.
        assert_eq!(distributor.on_snapshot_changed(&snapshot(2, &["v1"])), 1);
        assert_eq!(fast.try_recv().unwrap().sequence, 2);
        assert!(distributor.registry().get(slow.id()).is_none());
        assert!(distributor.registry().get(fast.id()).is_some());
    }

    #[test]
    fn dropped_subscription_is_removed_on_next_broadcast() {
        let (_store, distributor) = distributor(4);
        let sub = distributor.subscribe();
        let id = sub.id();
        drop(sub);

        assert_eq!(distributor.on_snapshot_changed(&snapshot(1, &["v1"])), 0);
        assert!(distributor.registry().get(id).is_none());
        assert!(!distributor.unsubscribe(id));
    }

    #[test]
    fn catch_up_after_newer_broadcast_is_not_redelivered() {
        let (store, distributor) = distributor(4);
        let mut sub = distributor.subscribe();

        let older = snapshot(1, &["v1"]);
        let newer = snapshot(2, &["v1"]);
        store.replace(Arc::clone(&older));
        distributor.on_snapshot_changed(&newer);

        // The catch-up reads the older store value after the broadcast landed.
        assert!(!distributor.on_subscriber_joined(sub.id()));
        assert_eq!(sub.try_recv().unwrap().sequence, 2);
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sequences_stay_ordered_under_churn() {
        let store = Arc::new(SnapshotStore::new());
        let registry = Arc::new(SubscriberRegistry::new());
        let distributor = Arc::new(Distributor::new(Arc::clone(&store), registry, 64));

        let producer = {
            let store = Arc::clone(&store);
            let distributor = Arc::clone(&distributor);
            tokio::spawn(async move {
                for sequence in 1..=200 {
                    let next = snapshot(sequence, &["v1"]);
                    store.replace(Arc::clone(&next));
                    distributor.on_snapshot_changed(&next);
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut consumers = Vec::new();
        for _ in 0..16 {
            let distributor = Arc::clone(&distributor);
            consumers.push(tokio::spawn(async move {
                let mut sub = distributor.subscribe();
                let mut last = 0;
                for _ in 0..20 {
                    match sub.try_recv() {
                        Ok(received) => {
                            assert!(received.sequence > last);
                            last = received.sequence;
                        }
                        Err(_) => tokio::task::yield_now().await,
                    }
                }
                distributor.unsubscribe(sub.id());
                while let Ok(received) = sub.try_recv() {
                    assert!(received.sequence > last);
                    last = received.sequence;
                }
            }));
        }

        producer.await.unwrap();
        for consumer in consumers {
            consumer.await.unwrap();
        }
    }
}
