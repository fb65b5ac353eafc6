//! Writer pump: drains the outbound queue and keeps the connection alive.
//!
//! Every write is bounded by the write deadline. The pump always releases
//! the connection on exit, whichever branch ended it.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::connection::ConnectionWriter;
use crate::types::PeerId;
use crate::ConnectionError;

use super::framing::coalesce;

pub(super) async fn write_pump<W: ConnectionWriter>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Bytes>,
    id: PeerId,
    config: HubConfig,
    cancel: CancellationToken,
) {
    let write_wait = config.write_wait;
    let ping_period = config.ping_period();

    // First ping one full period after start.
    let mut ticker = time::interval_at(Instant::now() + ping_period, ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Fires on every exit path, panics included.
    let _release = cancel.clone().drop_guard();

    let result = loop {
        let step = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),

            next = outbound.recv() => match next {
                Some(first) => {
                    let frame = coalesce(first, &mut outbound);
                    write_unless_released(&cancel, write_wait, "write", writer.send(frame)).await
                }
                None => {
                    // Removed from the hub and queue drained.
                    tracing::debug!(peer = %id, "outbound queue closed, sending close");
                    match write_unless_released(&cancel, write_wait, "close", writer.send_close()).await {
                        Some(sent) => break sent,
                        None => break Ok(()),
                    }
                }
            },

            _ = ticker.tick() => {
                write_unless_released(&cancel, write_wait, "ping", writer.send_ping()).await
            }
        };

        match step {
            Some(Ok(())) => {}
            Some(Err(e)) => break Err(e),
            // The reader released the connection mid-write.
            None => break Ok(()),
        }
    };

    if let Err(e) = result {
        tracing::debug!(peer = %id, "writer stopped: {e}");
    }

    cancel.cancel();
    if let Err(e) = with_deadline(write_wait, "close", writer.close()).await {
        tracing::trace!(peer = %id, "release failed: {e}");
    }
}

/// Run one deadline-bounded write, abandoning it if the connection is
/// released meanwhile. `None` means released.
async fn write_unless_released<F>(
    cancel: &CancellationToken,
    after: Duration,
    op: &'static str,
    write: F,
) -> Option<Result<(), ConnectionError>>
where
    F: Future<Output = Result<(), ConnectionError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = with_deadline(after, op, write) => Some(result),
    }
}

/// Run one write, failing with [`ConnectionError::DeadlineExceeded`] if it
/// takes longer than `after`.
async fn with_deadline<F>(after: Duration, op: &'static str, write: F) -> Result<(), ConnectionError>
where
    F: Future<Output = Result<(), ConnectionError>>,
{
    match time::timeout(after, write).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::DeadlineExceeded { op, after }),
    }
}
