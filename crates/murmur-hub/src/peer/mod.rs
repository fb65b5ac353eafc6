//! Peer: one connection bridged to the hub by two pumps.
//!
//! The reader pump owns the read half and turns inbound frames into
//! broadcasts. The writer pump owns the write half and the consumer side of
//! the bounded outbound queue; the hub owns the producer side. A shared
//! cancellation token stands in for "the connection is closed", so either
//! pump stopping wakes the other.

mod framing;
mod reader;
mod writer;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectionReader, ConnectionWriter};
use crate::hub::HubHandle;
use crate::types::PeerId;
use crate::HubError;

pub use framing::{coalesce, tag_message};

/// Handles to the two pumps of an attached peer.
#[derive(Debug)]
pub struct PeerTasks {
    id: PeerId,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl PeerTasks {
    /// The peer's hub identity.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Whether both pumps have exited.
    pub fn is_finished(&self) -> bool {
        self.reader.is_finished() && self.writer.is_finished()
    }

    /// Wait for both pumps to exit.
    ///
    /// Fails with the first pump's [`JoinError`] if either pump panicked
    /// or was aborted.
    pub async fn wait(self) -> Result<(), JoinError> {
        let reader = self.reader.await;
        let writer = self.writer.await;
        for (pump, result) in [("reader", &reader), ("writer", &writer)] {
            if let Err(e) = result {
                tracing::warn!(peer = %self.id, pump, "pump task failed: {e}");
            }
        }
        reader.and(writer)
    }
}

/// A peer registered with the hub whose pumps have not started yet.
///
/// Messages broadcast while a peer is in this state accumulate in its
/// outbound queue and are flushed by the writer's first write.
#[derive(Debug)]
pub struct Peer {
    id: PeerId,
    label: Arc<str>,
    hub: HubHandle,
    outbound: mpsc::Receiver<Bytes>,
}

impl Peer {
    /// Allocate an identity and a fresh outbound queue, and join the hub.
    ///
    /// If the hub announces joins, the notice is broadcast to every
    /// member, including this peer.
    pub async fn register(hub: &HubHandle, label: impl Into<String>) -> Result<Self, HubError> {
        let id = PeerId::next();
        let label: Arc<str> = Arc::from(label.into());

        let (outbound_tx, outbound) = mpsc::channel(hub.config().outbound_capacity);
        hub.join(id, label.clone(), outbound_tx).await?;

        if hub.config().announce_joins {
            hub.broadcast(framing::join_notice(&label)).await?;
        }

        Ok(Self {
            id,
            label,
            hub: hub.clone(),
            outbound,
        })
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Spawn the writer and reader pumps over the given connection halves.
    pub fn start<R, W>(self, reader: R, writer: W) -> PeerTasks
    where
        R: ConnectionReader + 'static,
        W: ConnectionWriter + 'static,
    {
        let config = self.hub.config().clone();
        let cancel = CancellationToken::new();

        let writer = tokio::spawn(writer::write_pump(
            writer,
            self.outbound,
            self.id,
            config.clone(),
            cancel.clone(),
        ));
        let reader = tokio::spawn(reader::read_pump(
            reader,
            self.id,
            self.label,
            self.hub,
            config,
            cancel,
        ));

        PeerTasks {
            id: self.id,
            reader,
            writer,
        }
    }
}

/// Register a new connection with the hub and start its pumps.
///
/// The peer is a member of the broadcast set before either pump runs.
pub async fn attach<R, W>(
    hub: &HubHandle,
    label: impl Into<String>,
    reader: R,
    writer: W,
) -> Result<PeerTasks, HubError>
where
    R: ConnectionReader + 'static,
    W: ConnectionWriter + 'static,
{
    Ok(Peer::register(hub, label).await?.start(reader, writer))
}
