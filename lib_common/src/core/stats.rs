//! # Poll Cycle Counters
//!
//! Lock-free accounting of what every poll cycle did. The poller is the only
//! writer; status endpoints read a `PollStatsView` at any time. All counters use
//! `Ordering::Relaxed`: each value is independently meaningful and nothing else
//! is synchronized through them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::error::PollError;

/// Counters for successful and failed poll cycles.
#[derive(Debug, Default)]
pub struct PollStats {
    installed: AtomicU64,
    fetch_failures: AtomicU64,
    decode_failures: AtomicU64,
    consecutive_failures: AtomicU64,
    last_sequence: AtomicU64,
}

/// Point-in-time copy of `PollStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatsView {
    /// Cycles that installed a snapshot.
    pub installed: u64,
    /// Cycles that failed to fetch, including timeouts.
    pub fetch_failures: u64,
    /// Cycles whose payload could not be decoded.
    pub decode_failures: u64,
    /// Failed cycles since the last success.
    pub consecutive_failures: u64,
    /// Sequence of the last installed snapshot, 0 if none.
    pub last_sequence: u64,
}

impl PollStats {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cycle that installed `sequence`.
    pub fn record_success(&self, sequence: u64) {
        self.installed.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_sequence.store(sequence, Ordering::Relaxed);
    }

    /// Records a failed cycle and returns the consecutive failure count.
    pub fn record_failure(&self, error: &PollError) -> u64 {
        match error {
            PollError::Fetch(_) => self.fetch_failures.fetch_add(1, Ordering::Relaxed),
            PollError::Decode(_) => self.decode_failures.fetch_add(1, Ordering::Relaxed),
        };
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Reads every counter.
    pub fn view(&self) -> PollStatsView {
        PollStatsView {
            installed: self.installed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_sequence: self.last_sequence.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{DecodeError, FetchError};
    use std::time::Duration;

    #[test]
    fn success_resets_the_failure_streak() {
        let stats = PollStats::new();
        assert_eq!(
            stats.record_failure(&FetchError::Timeout(Duration::from_secs(5)).into()),
            1
        );
        assert_eq!(
            stats.record_failure(&DecodeError::Malformed("eof".into()).into()),
            2
        );
        stats.record_success(3);

        let view = stats.view();
        assert_eq!(view.fetch_failures, 1);
        assert_eq!(view.decode_failures, 1);
        assert_eq!(view.consecutive_failures, 0);
        assert_eq!(view.installed, 1);
        assert_eq!(view.last_sequence, 3);
    }
}
