//! # Feed Polling Ingestor
//!
//! Owns the fetch, decode and store cycle for a feed that is only available by
//! polling.
//!
//! ## Key Design Principles:
//! - **Fixed cadence**: the first cycle runs immediately, then one per
//!   `poll_interval`. A cycle that overruns the interval delays the next tick;
//!   ticks are neither skipped in bulk nor queued up.
//! - **Single-flight**: the loop awaits a whole cycle before waiting for the
//!   next tick, so at most one fetch is in flight and sequences are installed in
//!   order.
//! - **Bounded fetch**: every fetch races `fetch_timeout`; losing the race is a
//!   fetch failure like any other.
//! - **Resilience**: a failed cycle leaves the store untouched, is counted and
//!   logged, and the loop carries on at the next tick.
//! - **Clean cancellation**: the only await points are the tick and the fetch.
//!   Installing and broadcasting a snapshot happens without suspending, so
//!   cancelling the loop never leaves an update half-applied.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::dispatcher::Distributor;
use crate::core::error::{FetchError, PollError};
use crate::core::feed::{Decoded, FeedDecoder, FeedSource};
use crate::core::snapshot::Snapshot;
use crate::core::snapshot_store::SnapshotStore;
use crate::core::stats::PollStats;

/// Invalid poller timing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The poll interval must be a positive, finite number of seconds.
    #[error("poll interval must be positive, got {0}s")]
    InvalidInterval(f64),

    /// The fetch timeout must be a positive, finite number of seconds.
    #[error("fetch timeout must be positive, got {0}s")]
    InvalidTimeout(f64),

    /// A timeout at or above the interval would let cycles pile up.
    #[error("fetch timeout ({timeout:?}) must be shorter than the poll interval ({interval:?})")]
    TimeoutNotBelowInterval {
        /// Configured fetch timeout.
        timeout: Duration,
        /// Configured poll interval.
        interval: Duration,
    },
}

/// Timing of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between the starts of consecutive cycles.
    pub poll_interval: Duration,
    /// Upper bound for one fetch.
    pub fetch_timeout: Duration,
}

impl PollerConfig {
    /// Validates and builds a config from seconds.
    pub fn from_secs(poll_interval: f64, fetch_timeout: f64) -> Result<Self, ConfigError> {
        let poll_interval = Duration::try_from_secs_f64(poll_interval)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or(ConfigError::InvalidInterval(poll_interval))?;
        let fetch_timeout = Duration::try_from_secs_f64(fetch_timeout)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or(ConfigError::InvalidTimeout(fetch_timeout))?;

        let config = Self {
            poll_interval,
            fetch_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the timeout is strictly shorter than the interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(0.0));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(0.0));
        }
        if self.fetch_timeout >= self.poll_interval {
            return Err(ConfigError::TimeoutNotBelowInterval {
                timeout: self.fetch_timeout,
                interval: self.poll_interval,
            });
        }
        Ok(())
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A snapshot was installed and broadcast.
    Installed {
        /// Sequence of the new snapshot.
        sequence: u64,
        /// Vehicles in the new snapshot.
        vehicles: usize,
        /// Subscribers that had it queued.
        delivered: usize,
    },
    /// Nothing was installed; the previous snapshot stays current.
    Failed(PollError),
}

/// The interval-driven producer of snapshots.
///
/// Cycles take `&mut self`, so whoever owns the poller is the single writer of
/// the store and overlapping cycles cannot be expressed.
pub struct Poller {
    config: PollerConfig,
    source: Arc<dyn FeedSource>,
    decoder: Arc<dyn FeedDecoder>,
    store: Arc<SnapshotStore>,
    distributor: Arc<Distributor>,
    stats: Arc<PollStats>,
    last_sequence: u64,
}

impl Poller {
    /// Creates a poller that continues the sequence already in `store` and
    /// records every cycle into `stats`.
    pub fn new(
        config: PollerConfig,
        source: Arc<dyn FeedSource>,
        decoder: Arc<dyn FeedDecoder>,
        store: Arc<SnapshotStore>,
        distributor: Arc<Distributor>,
        stats: Arc<PollStats>,
    ) -> Self {
        let last_sequence = store.sequence();
        Self {
            config,
            source,
            decoder,
            store,
            distributor,
            stats,
            last_sequence,
        }
    }

    /// Counters shared with status readers.
    pub fn stats(&self) -> Arc<PollStats> {
        Arc::clone(&self.stats)
    }

    /// # Main Execution Loop
    ///
    /// Ticks immediately, then every `poll_interval`, running one cycle per
    /// tick until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        log::info!(
            "Feed poller started (interval {:?}, fetch timeout {:?})",
            self.config.poll_interval,
            self.config.fetch_timeout
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.run_cycle() => {}
            }
        }

        log::info!("Feed poller stopped at sequence {}", self.last_sequence);
    }

    /// Runs exactly one fetch, decode, store and broadcast cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let bytes = match timeout(self.config.fetch_timeout, self.source.fetch()).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return self.fail(e.into()),
            Err(_) => return self.fail(FetchError::Timeout(self.config.fetch_timeout).into()),
        };

        match self.decoder.decode(&bytes) {
            Ok(decoded) => self.install(decoded),
            Err(e) => self.fail(e.into()),
        }
    }

    fn install(&mut self, decoded: Decoded) -> CycleOutcome {
        let sequence = self.last_sequence + 1;
        let snapshot = Arc::new(Snapshot::new(
            decoded.records,
            sequence,
            Utc::now(),
            decoded.feed_timestamp,
        ));

        self.store.replace(Arc::clone(&snapshot));
        self.last_sequence = sequence;
        self.stats.record_success(sequence);

        let delivered = self.distributor.on_snapshot_changed(&snapshot);
        log::info!(
            "Installed sequence {} with {} vehicles ({} subscribers notified)",
            sequence,
            snapshot.len(),
            delivered
        );

        CycleOutcome::Installed {
            sequence,
            vehicles: snapshot.len(),
            delivered,
        }
    }

    fn fail(&self, error: PollError) -> CycleOutcome {
        let streak = self.stats.record_failure(&error);
        log::warn!(
            "Poll cycle failed ({} in a row), serving sequence {}: {}",
            streak,
            self.last_sequence,
            error
        );
        CycleOutcome::Failed(error)
    }
}
