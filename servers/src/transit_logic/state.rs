use lib_common::core::{Distributor, PollStats, SnapshotStore, SubscriberRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    // Latest installed snapshot, read by the pull endpoint
    pub store: Arc<SnapshotStore>,
    // Subscribe/unsubscribe for WebSocket clients
    pub distributor: Arc<Distributor>,
    // Poll counters for /api/status, handed to the poller at build time
    pub stats: Arc<PollStats>,
    // Cancelled once on shutdown
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(outbox_capacity: usize, shutdown: CancellationToken) -> Self {
        let store = Arc::new(SnapshotStore::new());
        let registry = Arc::new(SubscriberRegistry::new());
        let distributor = Arc::new(Distributor::new(Arc::clone(&store), registry, outbox_capacity));
        Self {
            store,
            distributor,
            stats: Arc::new(PollStats::new()),
            shutdown,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.distributor.registry().len()
    }
}
