//! The hub event loop.
//!
//! A single async task that owns the broadcast set and processes one
//! command at a time. Runs until `Shutdown` or until every handle is gone.

use tokio::sync::mpsc;

use super::{HubCommand, HubState};

/// Main event loop: owns all hub state.
pub(super) async fn hub_loop(mut state: HubState, mut cmd_rx: mpsc::Receiver<HubCommand>) {
    tracing::debug!("hub loop started");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            HubCommand::Join {
                id,
                label,
                outbound,
            } => {
                state.join(id, label, outbound);
            }

            HubCommand::Leave { id } => {
                state.leave(id);
            }

            HubCommand::Broadcast { message } => {
                let fan_out = state.broadcast(&message);
                tracing::trace!(
                    delivered = fan_out.delivered,
                    dropped = fan_out.dropped.len(),
                    bytes = message.len(),
                    "broadcast"
                );
            }

            HubCommand::Peers { reply } => {
                let _ = reply.send(state.peer_ids());
            }

            HubCommand::Shutdown => {
                let closed = state.close_all();
                tracing::info!(peers = closed, "hub shutting down");
                return;
            }
        }
    }

    // Every handle dropped: release whoever is left.
    let closed = state.close_all();
    tracing::debug!(peers = closed, "hub loop ended, all handles dropped");
}
