//! Hub: single-writer authority over the broadcast set.
//!
//! One task owns a [`HubState`] and processes commands one at a time.
//! Joins, leaves and broadcasts share the same intake, so they form one
//! linearized timeline; the loop itself is the lock.

mod r#loop;
mod state;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::config::HubConfig;
use crate::metrics::{HubMetrics, MetricsSnapshot};
use crate::types::PeerId;
use crate::HubError;

pub use state::{FanOut, HubState};

// ── Commands (handles → loop) ─────────────────────────────────────────

/// Events the hub loop processes, in arrival order.
pub(crate) enum HubCommand {
    /// Admit a peer into the broadcast set.
    Join {
        id: PeerId,
        label: Arc<str>,
        outbound: mpsc::Sender<Bytes>,
    },
    /// Remove a peer (no-op if already gone).
    Leave { id: PeerId },
    /// Fan a message out to every member.
    Broadcast { message: Bytes },
    /// Query: current member ids.
    Peers { reply: oneshot::Sender<Vec<PeerId>> },
    /// Close every queue and stop the loop.
    Shutdown,
}

// ── HubHandle ─────────────────────────────────────────────────────────

/// Handle to a running hub.
///
/// Cheap to clone. Every method is a send on the hub's intake; none of
/// them touches the peer set directly.
#[derive(Clone)]
pub struct HubHandle {
    cmd_tx: mpsc::Sender<HubCommand>,
    metrics: Arc<HubMetrics>,
    config: Arc<HubConfig>,
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle")
            .field("closed", &self.cmd_tx.is_closed())
            .finish()
    }
}

impl HubHandle {
    /// Admit a peer. `outbound` must be the only sender for its queue:
    /// the hub closes the queue by dropping it.
    pub async fn join(
        &self,
        id: PeerId,
        label: impl Into<Arc<str>>,
        outbound: mpsc::Sender<Bytes>,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Join {
            id,
            label: label.into(),
            outbound,
        })
        .await
    }

    /// Remove a peer. Safe to call more than once.
    pub async fn leave(&self, id: PeerId) -> Result<(), HubError> {
        self.send(HubCommand::Leave { id }).await
    }

    /// Relay a message to every member, the sender included.
    pub async fn broadcast(&self, message: impl Into<Bytes>) -> Result<(), HubError> {
        self.send(HubCommand::Broadcast {
            message: message.into(),
        })
        .await
    }

    /// Ids of the current members, as seen by the loop after every
    /// previously submitted command.
    pub async fn peers(&self) -> Result<Vec<PeerId>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Peers { reply }).await?;
        rx.await.map_err(|_| HubError::Shutdown)
    }

    /// Number of current members.
    pub async fn peer_count(&self) -> Result<usize, HubError> {
        Ok(self.peers().await?.len())
    }

    /// Current statistics. Does not go through the loop.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Configuration this hub was spawned with.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Close every peer queue and stop the loop.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(HubCommand::Shutdown).await;
    }

    /// Whether the loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.cmd_tx.send(cmd).await.map_err(|_| HubError::Shutdown)
    }
}

// ── Hub ───────────────────────────────────────────────────────────────

/// The hub: spawn it and talk to it through [`HubHandle`].
#[derive(Debug)]
pub struct Hub;

impl Hub {
    /// Validate `config` and start the hub loop as a tokio task.
    pub fn spawn(config: HubConfig) -> Result<HubHandle, HubError> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<HubCommand>(config.intake_capacity);
        let metrics = Arc::new(HubMetrics::default());
        let state = HubState::new(metrics.clone());

        tokio::spawn(r#loop::hub_loop(state, cmd_rx));

        Ok(HubHandle {
            cmd_tx,
            metrics,
            config: Arc::new(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_rejects_invalid_config() {
        let err = Hub::spawn(HubConfig::new().outbound_capacity(0)).unwrap_err();
        assert!(matches!(err, HubError::Config(_)));
    }

    #[tokio::test]
    async fn join_broadcast_leave_through_loop() {
        let hub = Hub::spawn(HubConfig::new()).unwrap();
        let alice = PeerId::next();
        let bob = PeerId::next();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);

        hub.join(alice, "alice", tx_a).await.unwrap();
        hub.join(bob, "bob", tx_b).await.unwrap();
        hub.broadcast("hello").await.unwrap();

        assert_eq!(rx_a.recv().await.unwrap(), "hello");
        assert_eq!(rx_b.recv().await.unwrap(), "hello");

        hub.leave(alice).await.unwrap();
        hub.leave(alice).await.unwrap();
        assert_eq!(hub.peers().await.unwrap(), vec![bob]);
        assert!(rx_a.recv().await.is_none());

        let metrics = hub.metrics();
        assert_eq!(metrics.peers_joined, 2);
        assert_eq!(metrics.peers_removed, 1);
        assert_eq!(metrics.active_peers, 1);
        assert_eq!(metrics.deliveries, 2);
    }

    #[tokio::test]
    async fn shutdown_closes_queues_and_stops_loop() {
        let hub = Hub::spawn(HubConfig::new()).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        hub.join(PeerId::next(), "alice", tx).await.unwrap();

        hub.shutdown().await;
        assert!(rx.recv().await.is_none());
        assert!(matches!(hub.peers().await, Err(HubError::Shutdown)));
        assert!(matches!(hub.broadcast("late").await, Err(HubError::Shutdown)));
    }
}
