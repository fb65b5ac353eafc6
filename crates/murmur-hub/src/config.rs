use std::time::Duration;

use crate::HubError;

/// Configuration for a [`Hub`](crate::Hub) and the peers attached to it.
///
/// All fields have sensible defaults. Use the builder pattern:
///
/// ```rust
/// use murmur_hub::HubConfig;
/// use std::time::Duration;
///
/// let config = HubConfig::new()
///     .max_message_size(4096)
///     .outbound_capacity(512)
///     .pong_wait(Duration::from_secs(30));
/// assert_eq!(config.ping_period(), Duration::from_secs(27));
/// ```
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Deadline for a single outbound write (message, ping or close).
    pub(crate) write_wait: Duration,
    /// Read-liveness window, extended by every pong.
    pub(crate) pong_wait: Duration,
    /// Capacity of each peer's outbound queue.
    pub(crate) outbound_capacity: usize,
    /// Largest inbound message accepted from a peer.
    pub(crate) max_message_size: usize,
    /// Capacity of the hub's command intake.
    pub(crate) intake_capacity: usize,
    /// Broadcast a notice when a peer joins.
    pub(crate) announce_joins: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HubConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self {
            write_wait: crate::WRITE_WAIT,
            pong_wait: crate::PONG_WAIT,
            outbound_capacity: crate::OUTBOUND_CAPACITY,
            max_message_size: crate::MAX_MESSAGE_SIZE,
            intake_capacity: 256,
            announce_joins: true,
        }
    }

    /// Set the outbound write deadline (default: 10 s).
    pub fn write_wait(mut self, wait: Duration) -> Self {
        self.write_wait = wait;
        self
    }

    /// Set the read-liveness window (default: 60 s).
    ///
    /// The ping period is derived from it, see [`ping_period`](Self::ping_period).
    pub fn pong_wait(mut self, wait: Duration) -> Self {
        self.pong_wait = wait;
        self
    }

    /// Set the per-peer outbound queue capacity (default: 256).
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Set the inbound message size limit in bytes (default: 1024).
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the hub intake capacity (default: 256).
    pub fn intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    /// Enable or disable the "just joined" notice (default: enabled).
    pub fn announce_joins(mut self, enabled: bool) -> Self {
        self.announce_joins = enabled;
        self
    }

    /// Interval between pings: 9/10 of the liveness window, so at least one
    /// ping lands before the peer's read deadline expires.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }

    /// Check the config for values the hub cannot run with.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.outbound_capacity == 0 {
            return Err(HubError::Config("outbound capacity must be at least 1".into()));
        }
        if self.intake_capacity == 0 {
            return Err(HubError::Config("intake capacity must be at least 1".into()));
        }
        if self.max_message_size == 0 {
            return Err(HubError::Config("max message size must be at least 1 byte".into()));
        }
        if self.write_wait.is_zero() {
            return Err(HubError::Config("write wait must be non-zero".into()));
        }
        if self.ping_period().is_zero() {
            return Err(HubError::Config(format!(
                "pong wait {:?} is too short to derive a ping period",
                self.pong_wait
            )));
        }
        Ok(())
    }
}
