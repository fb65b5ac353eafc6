//! Reader pump: inbound frames become broadcasts.
//!
//! Runs until the connection fails, closes, goes silent past the liveness
//! window, or is released by the writer. Whatever the cause, it submits
//! exactly one leave and then releases the connection.

use std::sync::Arc;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::connection::{ConnectionReader, Inbound};
use crate::hub::HubHandle;
use crate::types::PeerId;
use crate::ConnectionError;

use super::framing::tag_message;

/// Why the reader stopped.
enum Exit {
    /// The writer released the connection first.
    Released,
    /// The hub loop is gone.
    HubClosed,
    /// Connection error, remote close or deadline.
    Failed(ConnectionError),
}

pub(super) async fn read_pump<R: ConnectionReader>(
    mut reader: R,
    id: PeerId,
    label: Arc<str>,
    hub: HubHandle,
    config: HubConfig,
    cancel: CancellationToken,
) {
    let pong_wait = config.pong_wait;
    // Releases the connection on every exit path, panics included.
    let release = cancel.clone().drop_guard();
    let mut deadline = Instant::now() + pong_wait;

    let exit = loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break Exit::Released,
            frame = time::timeout_at(deadline, reader.recv()) => frame,
        };

        match frame {
            Err(_elapsed) => {
                break Exit::Failed(ConnectionError::DeadlineExceeded {
                    op: "read",
                    after: pong_wait,
                });
            }
            Ok(Err(e)) => break Exit::Failed(e),
            Ok(Ok(Inbound::Pong)) => {
                deadline = Instant::now() + pong_wait;
            }
            Ok(Ok(Inbound::Ping)) => {}
            Ok(Ok(Inbound::Message(data))) => {
                if data.len() > config.max_message_size {
                    break Exit::Failed(ConnectionError::MessageTooLarge {
                        size: data.len(),
                        max: config.max_message_size,
                    });
                }
                if hub.broadcast(tag_message(&label, &data)).await.is_err() {
                    break Exit::HubClosed;
                }
            }
        }
    };

    match &exit {
        Exit::Failed(e) if e.is_unexpected_close() => {
            tracing::warn!(peer = %id, label = %label, "unexpected close: {e}");
        }
        Exit::Failed(e) => {
            tracing::debug!(peer = %id, label = %label, "reader stopped: {e}");
        }
        Exit::Released => {
            tracing::debug!(peer = %id, label = %label, "reader stopped: connection released");
        }
        Exit::HubClosed => {
            tracing::debug!(peer = %id, label = %label, "reader stopped: hub shut down");
        }
    }

    // A failed leave means the hub is gone, which already closed our queue.
    let _ = hub.leave(id).await;
    drop(release);
}
