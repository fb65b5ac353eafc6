use bytes::Bytes;

use crate::ConnectionError;

/// WebSocket close codes the hub cares about.
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// The endpoint is going away (browser tab closed, server restart).
    pub const GOING_AWAY: u16 = 1001;
    /// Connection dropped without a close frame. Never sent on the wire.
    pub const ABNORMAL: u16 = 1006;
}

/// A frame read from a peer's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An application message (text or binary, treated as opaque bytes).
    Message(Bytes),
    /// A liveness probe from the remote. Transports answer it themselves.
    Ping,
    /// Answer to one of our liveness probes.
    Pong,
}

/// Read half of a peer connection.
///
/// In production: implemented over a WebSocket stream.
/// In tests: implemented by an in-memory mock.
#[async_trait::async_trait]
pub trait ConnectionReader: Send {
    /// Wait for the next frame.
    ///
    /// A close frame from the remote is reported as
    /// [`ConnectionError::Closed`]. Implementations should enforce the
    /// inbound size limit and fail with [`ConnectionError::MessageTooLarge`].
    async fn recv(&mut self) -> Result<Inbound, ConnectionError>;
}

/// Write half of a peer connection.
///
/// Deadlines are applied by the caller; implementations simply perform
/// the write.
#[async_trait::async_trait]
pub trait ConnectionWriter: Send {
    /// Write one text message.
    async fn send(&mut self, data: Bytes) -> Result<(), ConnectionError>;

    /// Write a liveness probe.
    async fn send_ping(&mut self) -> Result<(), ConnectionError>;

    /// Write a close notification.
    async fn send_close(&mut self) -> Result<(), ConnectionError>;

    /// Release the underlying transport.
    async fn close(&mut self) -> Result<(), ConnectionError>;
}
