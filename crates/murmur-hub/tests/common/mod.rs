//! In-memory connection used by the integration tests.
//!
//! `mock_connection()` returns the two halves the hub consumes plus a
//! `MockRemote` that plays the other end: it injects inbound frames and
//! observes everything the writer pump puts on the wire.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use murmur_hub::{ConnectionError, ConnectionReader, ConnectionWriter, Inbound};
use tokio::sync::mpsc;

/// Something the writer pump did to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(Bytes),
    Ping,
    Close,
    /// The writer released the transport.
    Released,
}

pub struct MockReader {
    inbound: mpsc::UnboundedReceiver<Result<Inbound, ConnectionError>>,
}

pub struct MockWriter {
    outbound: mpsc::UnboundedSender<Outbound>,
    stalled: Arc<AtomicBool>,
}

pub struct MockRemote {
    inbound: mpsc::UnboundedSender<Result<Inbound, ConnectionError>>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    stalled: Arc<AtomicBool>,
}

pub fn mock_connection() -> (MockReader, MockWriter, MockRemote) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let stalled = Arc::new(AtomicBool::new(false));

    (
        MockReader { inbound: in_rx },
        MockWriter {
            outbound: out_tx,
            stalled: stalled.clone(),
        },
        MockRemote {
            inbound: in_tx,
            outbound: out_rx,
            stalled,
        },
    )
}

#[async_trait::async_trait]
impl ConnectionReader for MockReader {
    async fn recv(&mut self) -> Result<Inbound, ConnectionError> {
        match self.inbound.recv().await {
            Some(frame) => frame,
            None => Err(ConnectionError::Reset),
        }
    }
}

impl MockWriter {
    async fn write(&mut self, what: Outbound) -> Result<(), ConnectionError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.outbound
            .send(what)
            .map_err(|_| ConnectionError::Reset)
    }
}

#[async_trait::async_trait]
impl ConnectionWriter for MockWriter {
    async fn send(&mut self, data: Bytes) -> Result<(), ConnectionError> {
        self.write(Outbound::Message(data)).await
    }

    async fn send_ping(&mut self) -> Result<(), ConnectionError> {
        self.write(Outbound::Ping).await
    }

    async fn send_close(&mut self) -> Result<(), ConnectionError> {
        self.write(Outbound::Close).await
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        // Releasing never stalls.
        let _ = self.outbound.send(Outbound::Released);
        Ok(())
    }
}

impl MockRemote {
    pub fn send_text(&self, text: &str) {
        let _ = self
            .inbound
            .send(Ok(Inbound::Message(Bytes::copy_from_slice(text.as_bytes()))));
    }

    pub fn send_bytes(&self, data: Vec<u8>) {
        let _ = self.inbound.send(Ok(Inbound::Message(Bytes::from(data))));
    }

    pub fn send_pong(&self) {
        let _ = self.inbound.send(Ok(Inbound::Pong));
    }

    pub fn send_ping(&self) {
        let _ = self.inbound.send(Ok(Inbound::Ping));
    }

    /// Deliver a close frame with the given code.
    pub fn close(&self, code: Option<u16>) {
        let _ = self.inbound.send(Err(ConnectionError::Closed { code }));
    }

    pub fn fail(&self, err: ConnectionError) {
        let _ = self.inbound.send(Err(err));
    }

    /// Make every subsequent write hang until its deadline.
    pub fn stall_writes(&self, stall: bool) {
        self.stalled.store(stall, Ordering::SeqCst);
    }

    /// Next thing the writer did, waiting up to `within`.
    pub async fn next_outbound_within(&mut self, within: Duration) -> Option<Outbound> {
        tokio::time::timeout(within, self.outbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next thing the writer did. Panics after two minutes of silence,
    /// which covers a full liveness window on a paused clock.
    pub async fn next_outbound(&mut self) -> Outbound {
        self.next_outbound_within(Duration::from_secs(120))
            .await
            .expect("no outbound activity")
    }

    /// Next written frame, skipping pings.
    pub async fn next_frame(&mut self) -> Bytes {
        loop {
            match self.next_outbound().await {
                Outbound::Message(data) => return data,
                Outbound::Ping => continue,
                other => panic!("expected a message frame, got {other:?}"),
            }
        }
    }

    /// Collect `count` messages, splitting coalesced frames on newlines.
    pub async fn next_lines(&mut self, count: usize) -> Vec<String> {
        let mut lines = Vec::new();
        while lines.len() < count {
            let frame = self.next_frame().await;
            lines.extend(
                String::from_utf8(frame.to_vec())
                    .expect("utf-8 frame")
                    .split('\n')
                    .map(str::to_string),
            );
        }
        lines
    }

    /// Non-blocking peek at pending writer activity.
    pub fn try_outbound(&mut self) -> Option<Outbound> {
        self.outbound.try_recv().ok()
    }

    /// Wait until the writer releases the connection, returning what it
    /// did in between.
    pub async fn until_released(&mut self) -> Vec<Outbound> {
        let mut seen = Vec::new();
        loop {
            let next = self.next_outbound().await;
            if next == Outbound::Released {
                return seen;
            }
            seen.push(next);
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
