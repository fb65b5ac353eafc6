//! Hub statistics.
//!
//! The hub loop is the only writer; any number of handles may read.
//! All operations use [`Ordering::Relaxed`]: the numbers are for
//! observability, not for synchronization.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A monotonically increasing counter.
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Counter").field(&self.get()).finish()
    }
}

/// A value that can move in both directions (current peer count).
#[derive(Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Gauge").field(&self.get()).finish()
    }
}

/// Live statistics for one hub.
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Peers currently in the broadcast set.
    pub active_peers: Gauge,
    /// Peers admitted through a join.
    pub peers_joined: Counter,
    /// Peers removed for any reason (leave, slow consumer, closed queue).
    pub peers_removed: Counter,
    /// Subset of `peers_removed` dropped because their queue was full.
    pub slow_peers_dropped: Counter,
    /// Broadcast events processed.
    pub broadcasts: Counter,
    /// Messages successfully enqueued onto a peer's outbound queue.
    pub deliveries: Counter,
}

impl HubMetrics {
    /// Point-in-time copy of every value.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_peers: self.active_peers.get(),
            peers_joined: self.peers_joined.get(),
            peers_removed: self.peers_removed.get(),
            slow_peers_dropped: self.slow_peers_dropped.get(),
            broadcasts: self.broadcasts.get(),
            deliveries: self.deliveries.get(),
        }
    }
}

/// Serializable copy of [`HubMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub active_peers: u64,
    pub peers_joined: u64,
    pub peers_removed: u64,
    pub slow_peers_dropped: u64,
    pub broadcasts: u64,
    pub deliveries: u64,
}
