//! murmur broadcast hub.
//!
//! Peers connect over a framed bidirectional connection; every message one
//! peer sends is relayed to every connected peer (the sender included).
//!
//! A single control loop owns the peer set. Joins, leaves and broadcasts all
//! arrive on the same intake, so every membership decision is linearized with
//! respect to fan-out. Each peer runs two pumps: a reader that turns inbound
//! frames into broadcasts, and a writer that drains the peer's bounded
//! outbound queue, coalesces bursts and keeps the connection alive with pings.
//!
//! The hub never touches a socket. Transports plug in through
//! [`ConnectionReader`] and [`ConnectionWriter`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use murmur_hub::{attach, ConnectionReader, ConnectionWriter, Hub, HubConfig};
//!
//! # async fn example<R, W>(reader: R, writer: W) -> Result<(), murmur_hub::HubError>
//! # where R: ConnectionReader + 'static, W: ConnectionWriter + 'static {
//! let hub = Hub::spawn(HubConfig::new())?;
//!
//! // For each accepted connection:
//! let tasks = attach(&hub, "10.0.0.1:5", reader, writer).await?;
//! println!("peer {} attached", tasks.id());
//!
//! hub.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod hub;
mod metrics;
mod peer;
mod types;

pub use config::HubConfig;
pub use connection::{close_code, ConnectionReader, ConnectionWriter, Inbound};
pub use error::{ConnectionError, HubError};
pub use hub::{FanOut, Hub, HubHandle, HubState};
pub use metrics::{Counter, Gauge, HubMetrics, MetricsSnapshot};
pub use peer::{attach, coalesce, tag_message, Peer, PeerTasks};
pub use types::PeerId;

/// Deadline applied to every outbound write.
pub const WRITE_WAIT: std::time::Duration = std::time::Duration::from_secs(10);

/// How long a peer may stay silent (no pong) before it is considered dead.
pub const PONG_WAIT: std::time::Duration = std::time::Duration::from_secs(60);

/// Capacity of each peer's outbound queue.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Largest inbound message accepted from a single peer, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 1024;
