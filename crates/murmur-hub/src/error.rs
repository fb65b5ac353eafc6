use std::time::Duration;

use crate::close_code;

/// Errors returned by the hub API.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("hub is shut down")]
    Shutdown,

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Terminal conditions reported by a connection or detected by a pump.
///
/// Every variant ends the affected peer. None of them is retried.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The remote sent a close frame. `None` means the frame carried no status.
    #[error("connection closed by remote (code {})", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Closed { code: Option<u16> },

    /// The transport went away without a closing handshake.
    #[error("connection reset without closing handshake")]
    Reset,

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{op} deadline of {after:?} exceeded")]
    DeadlineExceeded { op: &'static str, after: Duration },
}

impl ConnectionError {
    /// Whether this is a close the peer was not expected to perform.
    ///
    /// Going-away (1001) and abnormal closure (1006, surfaced as
    /// [`Reset`](Self::Reset)) are expected. Any other close code, and a
    /// close frame without a status, is unexpected. Non-close errors are
    /// never reported as unexpected closes.
    pub fn is_unexpected_close(&self) -> bool {
        match self {
            ConnectionError::Closed { code: Some(code) } => {
                !matches!(*code, close_code::GOING_AWAY | close_code::ABNORMAL)
            }
            ConnectionError::Closed { code: None } => true,
            _ => false,
        }
    }
}
