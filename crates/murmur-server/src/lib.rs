//! murmur server: serves the chat page and bridges WebSocket connections
//! onto a [`murmur_hub`] broadcast hub.
//!
//! Routes:
//! - `GET /` returns the index page.
//! - `/ws` upgrades to a WebSocket and attaches the connection as a peer,
//!   labelled with its remote address.
//! - anything else is `404 Not found`.

mod server;
mod ws;

pub use server::{Server, ServerConfig};
pub use ws::{WsReader, WsWriter};
