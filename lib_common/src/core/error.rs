//! # Pipeline Errors
//!
//! Every error here is recovered locally. Fetch and decode failures skip one
//! cycle and leave the last good snapshot in place; an unreachable subscriber is
//! dropped from the registry. None of them stop the poller.

use std::time::Duration;

use thiserror::Error;

use super::registry::SubscriberId;

/// Failure reaching the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, TLS or body read failure.
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 401 or 403.
    #[error("upstream rejected the credentials (HTTP {0})")]
    Unauthorized(u16),

    /// Any other non-success status.
    #[error("upstream answered with HTTP {0}")]
    Status(u16),

    /// The fetch exceeded the configured timeout.
    #[error("fetch did not complete within {0:?}")]
    Timeout(Duration),
}

/// The feed payload could not be turned into vehicle records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not a valid encoding of the expected message.
    #[error("malformed feed payload: {0}")]
    Malformed(String),
}

/// Why a poll cycle did not install a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// The source failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The decoder rejected the payload.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// A subscriber's outbox was full or its receiver is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("subscriber {id} is unreachable ({reason})")]
pub struct SubscriberUnreachable {
    /// The dropped subscriber.
    pub id: SubscriberId,
    /// "outbox full" or "receiver dropped".
    pub reason: &'static str,
}
