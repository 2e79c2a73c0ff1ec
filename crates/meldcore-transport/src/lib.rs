//! Byte transport under the game server.
//!
//! The server speaks through the [`Transport`] and [`Connection`]
//! traits and never touches a socket type directly, which keeps the
//! session and room layers testable with loopback connections.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// A listener that yields connections as peers dial in.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Blocks until the next peer connects and hands back its
    /// connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting. Existing connections are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One peer, message-oriented in both directions. Implementations own
/// their framing; callers see whole messages only.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next inbound message, or `Ok(None)` once the peer has closed
    /// cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    /// Identifier for logs and per-connection maps, unique for the
    /// lifetime of the transport.
    fn id(&self) -> ConnectionId;
}

/// Opaque per-connection handle. Only the transport that issued it can
/// interpret the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_round_trips_raw_value() {
        assert_eq!(ConnectionId::new(42).into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display_is_prefixed() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_indexes_a_map() {
        use std::collections::HashMap;
        let mut names = HashMap::new();
        names.insert(ConnectionId::new(1), "asha");
        names.insert(ConnectionId::new(2), "ravi");
        assert_eq!(names[&ConnectionId::new(1)], "asha");
    }
}
