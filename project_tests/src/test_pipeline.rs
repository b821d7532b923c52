//! # Pipeline Tests
//!
//! Drives `Poller` -> `SnapshotStore` -> `Distributor` end to end with the real
//! GTFS-Realtime decoder, feeding it scripted protobuf payloads instead of HTTP.

use async_trait::async_trait;
use bytes::Bytes;
use lib_common::core::{
    Distributor, FeedSource, FetchError, Latest, PollError, PollStats, SnapshotStore,
    SubscriberRegistry,
};
use lib_common::ingestors::{CycleOutcome, Poller, PollerConfig};
use lib_common::transit::gtfs_realtime::{
    FeedEntity, FeedHeader, FeedMessage, Position, VehicleDescriptor, VehiclePosition,
};
use lib_common::transit::GtfsRealtimeDecoder;
use prost::Message;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// // Statement: What the scripted feed answers on each fetch
enum Step {
    Vehicles(Vec<(&'static str, f32, f32)>),
    Fail(FetchError),
    Hang,
}

struct ScriptedFeed {
    steps: Mutex<VecDeque<Step>>,
}

impl ScriptedFeed {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
        })
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch(&self) -> Result<Bytes, FetchError> {
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Vehicles(vehicles)) => Ok(Bytes::from(encode_feed(&vehicles))),
            Some(Step::Fail(e)) => Err(e),
            // // Statement: An exhausted script behaves like a feed that never answers
            Some(Step::Hang) | None => std::future::pending().await,
        }
    }
}

fn encode_feed(vehicles: &[(&str, f32, f32)]) -> Vec<u8> {
    FeedMessage {
        header: Some(FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            incrementality: None,
            timestamp: Some(1_714_557_600),
        }),
        entity: vehicles
            .iter()
            .map(|(id, latitude, longitude)| FeedEntity {
                id: id.to_string(),
                is_deleted: None,
                vehicle: Some(VehiclePosition {
                    position: Some(Position {
                        latitude: *latitude,
                        longitude: *longitude,
                        bearing: None,
                        odometer: None,
                        speed: None,
                    }),
                    vehicle: Some(VehicleDescriptor {
                        id: Some(id.to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            })
            .collect(),
    }
    .encode_to_vec()
}

struct Pipeline {
    store: Arc<SnapshotStore>,
    distributor: Arc<Distributor>,
    poller: Poller,
}

fn pipeline(steps: Vec<Step>, outbox_capacity: usize) -> Pipeline {
    let store = Arc::new(SnapshotStore::new());
    let registry = Arc::new(SubscriberRegistry::new());
    let distributor = Arc::new(Distributor::new(Arc::clone(&store), registry, outbox_capacity));
    let config = PollerConfig::from_secs(10.0, 5.0).unwrap();
    let poller = Poller::new(
        config,
        ScriptedFeed::new(steps),
        Arc::new(GtfsRealtimeDecoder::new()),
        Arc::clone(&store),
        Arc::clone(&distributor),
        Arc::new(PollStats::new()),
    );
    Pipeline {
        store,
        distributor,
        poller,
    }
}

fn three_vehicles() -> Step {
    Step::Vehicles(vec![("v1", 28.61, 77.20), ("v2", 28.62, 77.21), ("v3", 28.63, 77.22)])
}

fn ids(latest: &Latest) -> Vec<String> {
    latest
        .snapshot()
        .map(|s| s.records.iter().map(|r| r.id.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn first_fetch_installs_sequence_one() {
    let mut p = pipeline(vec![three_vehicles()], 16);
    assert!(matches!(p.store.latest(), Latest::NoDataYet));

    let outcome = p.poller.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Installed { sequence: 1, vehicles: 3, .. }));

    let latest = p.store.latest();
    assert_eq!(ids(&latest), ["v1", "v2", "v3"]);
    assert_eq!(latest.snapshot().unwrap().sequence, 1);
    assert_eq!(latest.snapshot().unwrap().feed_timestamp, Some(1_714_557_600));
}

#[tokio::test(start_paused = true)]
async fn timed_out_fetch_keeps_last_good_snapshot() {
    let mut p = pipeline(vec![three_vehicles(), Step::Hang], 16);
    p.poller.run_cycle().await;
    let before = p.store.current().unwrap();
    let before_json = serde_json::to_string(&p.store.latest()).unwrap();

    let outcome = p.poller.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Failed(PollError::Fetch(FetchError::Timeout(Duration::from_secs(5))))
    );

    let after = p.store.current().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(serde_json::to_string(&p.store.latest()).unwrap(), before_json);
    assert_eq!(p.poller.stats().view().fetch_failures, 1);
}

#[tokio::test]
async fn duplicate_ids_keep_the_later_entity() {
    let mut p = pipeline(vec![Step::Vehicles(vec![("v1", 1.0, 1.0), ("v2", 2.0, 2.0), ("v1", 3.0, 3.0)])], 16);
    p.poller.run_cycle().await;

    let snapshot = p.store.current().unwrap();
    assert_eq!(snapshot.len(), 2);
    let v1 = snapshot.get("v1").unwrap();
    assert_eq!((v1.latitude, v1.longitude), (3.0, 3.0));
}

#[tokio::test]
async fn early_subscriber_gets_exactly_the_first_snapshot() {
    let mut p = pipeline(vec![three_vehicles()], 16);
    let mut subscription = p.distributor.subscribe();
    assert!(matches!(p.store.latest(), Latest::NoDataYet));
    assert!(subscription.try_recv().is_err());

    p.poller.run_cycle().await;

    let pushed = subscription.try_recv().unwrap();
    assert_eq!(pushed.sequence, 1);
    assert!(subscription.try_recv().is_err());
}

#[tokio::test]
async fn empty_feed_is_a_valid_snapshot() {
    let mut p = pipeline(vec![three_vehicles(), Step::Vehicles(Vec::new())], 16);
    let mut subscription = p.distributor.subscribe();

    p.poller.run_cycle().await;
    let outcome = p.poller.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Installed { sequence: 2, vehicles: 0, delivered: 1 }));

    assert_eq!(subscription.try_recv().unwrap().sequence, 1);
    let second = subscription.try_recv().unwrap();
    assert_eq!(second.sequence, 2);
    assert!(second.records.is_empty());
    assert_eq!(p.poller.stats().view().consecutive_failures, 0);
}

#[tokio::test]
async fn sequence_only_moves_on_success() {
    let mut p = pipeline(
        vec![
            three_vehicles(),
            Step::Fail(FetchError::Unauthorized(401)),
            three_vehicles(),
            Step::Fail(FetchError::Network("connection reset".to_string())),
            three_vehicles(),
        ],
        16,
    );

    let mut observed = Vec::new();
    for _ in 0..5 {
        p.poller.run_cycle().await;
        observed.push(p.store.sequence());
    }
    assert_eq!(observed, [1, 1, 2, 2, 3]);

    let stats = p.poller.stats().view();
    assert_eq!(stats.installed, 3);
    assert_eq!(stats.fetch_failures, 2);
}

#[tokio::test]
async fn late_subscriber_catches_up_before_the_next_push() {
    let mut p = pipeline(vec![three_vehicles(), three_vehicles()], 16);
    p.poller.run_cycle().await;

    let mut subscription = p.distributor.subscribe();
    p.poller.run_cycle().await;

    assert_eq!(subscription.try_recv().unwrap().sequence, 1);
    assert_eq!(subscription.try_recv().unwrap().sequence, 2);
}

#[tokio::test(start_paused = true)]
async fn run_loop_polls_on_the_interval_until_cancelled() {
    let p = pipeline(vec![three_vehicles(), three_vehicles(), three_vehicles()], 16);
    let store = Arc::clone(&p.store);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(p.poller.run(cancel.clone()));

    // // Statement: First tick fires immediately
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(store.sequence(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.sequence(), 2);

    cancel.cancel();
    handle.await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.sequence(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscribers_never_see_sequences_out_of_order() {
    let cycles = 200;
    let steps = (0..cycles).map(|_| three_vehicles()).collect();
    let mut p = pipeline(steps, 1024);
    let distributor = Arc::clone(&p.distributor);

    let churn = tokio::spawn(async move {
        let mut readers = Vec::new();
        for _ in 0..50 {
            let mut subscription = distributor.subscribe();
            let distributor = Arc::clone(&distributor);
            readers.push(tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..5 {
                    match tokio::time::timeout(Duration::from_millis(50), subscription.recv()).await {
                        Ok(Some(snapshot)) => {
                            assert!(snapshot.sequence > last, "{} after {}", snapshot.sequence, last);
                            last = snapshot.sequence;
                        }
                        _ => break,
                    }
                }
                distributor.unsubscribe(subscription.id());
            }));
            tokio::task::yield_now().await;
        }
        for reader in readers {
            reader.await.unwrap();
        }
    });

    for _ in 0..cycles {
        p.poller.run_cycle().await;
        tokio::task::yield_now().await;
    }

    churn.await.unwrap();
    assert_eq!(p.store.sequence(), cycles as u64);
}
