//! HubState: the broadcast set and its fan-out rules.
//!
//! Pure state machine: no tasks, no I/O beyond non-blocking queue pushes.
//! Owned by exactly one hub loop, which makes every method here atomic
//! with respect to membership.
//!
//! Closing a peer's queue means dropping the slot that holds its sender:
//! the writer pump drains what is left and then sees the queue end.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::metrics::HubMetrics;
use crate::types::PeerId;

/// Hub-side view of one peer.
struct PeerSlot {
    label: Arc<str>,
    /// Producer side of the peer's outbound queue. Sole owner.
    outbound: mpsc::Sender<Bytes>,
}

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOut {
    /// Peers the message was enqueued for.
    pub delivered: usize,
    /// Peers removed during this fan-out (queue full or already closed).
    pub dropped: Vec<PeerId>,
}

/// The set of peers currently receiving broadcasts.
pub struct HubState {
    peers: HashMap<PeerId, PeerSlot>,
    metrics: Arc<HubMetrics>,
}

impl std::fmt::Debug for HubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubState")
            .field("peers", &self.peers.len())
            .finish()
    }
}

impl HubState {
    pub fn new(metrics: Arc<HubMetrics>) -> Self {
        Self {
            peers: HashMap::new(),
            metrics,
        }
    }

    /// Number of peers in the broadcast set.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    /// Label of a member, if present.
    pub fn label(&self, id: PeerId) -> Option<&str> {
        self.peers.get(&id).map(|slot| &*slot.label)
    }

    /// Ids of all members, sorted.
    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<_> = self.peers.keys().copied().collect();
        ids.sort();
        ids
    }

    // ── Membership ──────────────────────────────────────────────────────

    /// Admit a peer. Joining an id twice replaces the earlier slot.
    pub fn join(&mut self, id: PeerId, label: Arc<str>, outbound: mpsc::Sender<Bytes>) {
        self.peers.insert(id, PeerSlot { label, outbound });
        self.metrics.peers_joined.inc();
        self.sync_gauge();
        tracing::info!(peer = %id, peers = self.peers.len(), "peer joined");
    }

    /// Remove a peer and close its queue.
    ///
    /// Returns `false` (and does nothing) if the peer is not a member, so
    /// every failure path may issue a leave without coordination.
    pub fn leave(&mut self, id: PeerId) -> bool {
        let Some(slot) = self.peers.remove(&id) else {
            tracing::trace!(peer = %id, "leave for non-member ignored");
            return false;
        };
        self.metrics.peers_removed.inc();
        self.sync_gauge();
        tracing::info!(peer = %id, label = %slot.label, peers = self.peers.len(), "peer left");
        true
    }

    /// Close every queue and empty the set. Returns how many peers were removed.
    pub fn close_all(&mut self) -> usize {
        let count = self.peers.len();
        self.peers.clear();
        self.metrics.peers_removed.inc_by(count as u64);
        self.sync_gauge();
        count
    }

    // ── Fan-out ─────────────────────────────────────────────────────────

    /// Offer `message` to every member without waiting.
    ///
    /// A member whose queue is full is consuming too slowly: it is removed
    /// on the spot and its queue closed. Delivery to the other members is
    /// unaffected.
    pub fn broadcast(&mut self, message: &Bytes) -> FanOut {
        let mut fan_out = FanOut::default();
        let mut slow = 0u64;

        self.peers.retain(|id, slot| match slot.outbound.try_send(message.clone()) {
            Ok(()) => {
                fan_out.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(peer = %id, label = %slot.label, "outbound queue full, dropping slow peer");
                fan_out.dropped.push(*id);
                slow += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(peer = %id, label = %slot.label, "outbound queue closed, removing peer");
                fan_out.dropped.push(*id);
                false
            }
        });

        self.metrics.broadcasts.inc();
        self.metrics.deliveries.inc_by(fan_out.delivered as u64);
        self.metrics.slow_peers_dropped.inc_by(slow);
        if !fan_out.dropped.is_empty() {
            self.metrics.peers_removed.inc_by(fan_out.dropped.len() as u64);
            self.sync_gauge();
        }
        fan_out
    }

    fn sync_gauge(&self) {
        self.metrics.active_peers.set(self.peers.len() as u64);
    }
}
