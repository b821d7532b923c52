//! # Subscriber Registry
//!
//! Membership set of the subscribers currently receiving snapshot pushes.
//! Connection tasks add and remove members at any time; the `Distributor` takes
//! a copy of the membership at the start of each broadcast and iterates it with
//! no lock held, so churn never blocks or breaks a broadcast in progress.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};

use super::error::SubscriberUnreachable;
use super::snapshot::Snapshot;

/// Opaque identifier assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The delivery side of one subscriber.
///
/// Owns the sending half of the subscriber's bounded outbox and the sequence of
/// the last snapshot handed to it. Offers are serialized per subscriber so that
/// a join catch-up racing a broadcast can never deliver an older snapshot after
/// a newer one.
pub struct SubscriberHandle {
    id: SubscriberId,
    outbox: mpsc::Sender<Arc<Snapshot>>,
    last_sent: Mutex<u64>,
}

impl SubscriberHandle {
    /// Creates a handle with an outbox of `capacity` snapshots and returns the
    /// receiving half for the connection layer to drain.
    pub fn new(id: SubscriberId, capacity: usize) -> (Self, mpsc::Receiver<Arc<Snapshot>>) {
        let (outbox, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            outbox,
            last_sent: Mutex::new(0),
        };
        (handle, rx)
    }

    /// This subscriber's id.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Sequence of the last snapshot delivered, 0 if none.
    pub fn last_sent(&self) -> u64 {
        *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands `snapshot` to the outbox without waiting.
    ///
    /// Returns `Ok(false)` when the subscriber already received this sequence or
    /// a newer one, `Ok(true)` when it was queued.
    pub fn offer(&self, snapshot: &Arc<Snapshot>) -> Result<bool, SubscriberUnreachable> {
        let mut last_sent = self.last_sent.lock().unwrap_or_else(PoisonError::into_inner);
        if snapshot.sequence <= *last_sent {
            return Ok(false);
        }

        match self.outbox.try_send(Arc::clone(snapshot)) {
            Ok(()) => {
                *last_sent = snapshot.sequence;
                Ok(true)
            }
            Err(TrySendError::Full(_)) => Err(SubscriberUnreachable {
                id: self.id,
                reason: "outbox full",
            }),
            Err(TrySendError::Closed(_)) => Err(SubscriberUnreachable {
                id: self.id,
                reason: "receiver dropped",
            }),
        }
    }
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("last_sent", &self.last_sent())
            .finish()
    }
}

/// Thread-safe set of live subscribers.
#[derive(Default)]
pub struct SubscriberRegistry {
    members: Mutex<HashMap<SubscriberId, Arc<SubscriberHandle>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh, never reused id.
    pub fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Adds a member. A handle with the same id replaces the old one.
    pub fn add(&self, handle: Arc<SubscriberHandle>) {
        let id = handle.id();
        self.lock().insert(id, handle);
        log::debug!("Subscriber {} registered", id);
    }

    /// Removes a member. Unknown ids are a no-op and return `false`.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            log::debug!("Subscriber {} removed", id);
        }
        removed
    }

    /// Looks a member up.
    pub fn get(&self, id: SubscriberId) -> Option<Arc<SubscriberHandle>> {
        self.lock().get(&id).cloned()
    }

    /// Copy of the current membership, taken under one short critical section.
    pub fn members(&self) -> Vec<Arc<SubscriberHandle>> {
        self.lock().values().cloned().collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True with no members.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, Arc<SubscriberHandle>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
