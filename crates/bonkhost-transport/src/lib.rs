//! Transport layer for the bonkhost server.
//!
//! One TCP port carries two things: the game's WebSocket dialect and a
//! trivial HTTP metadata probe. [`Listener::accept`] tells them apart
//! and yields an [`Incoming`] for each. TLS is optional and applied
//! before anything is read from the socket.

mod error;
mod stream;
mod tls;
mod websocket;

pub use error::TransportError;
pub use tls::load_tls_config;
pub use websocket::{HttpRequest, Incoming, Listener, WsConnection, WsReader, WsWriter};

use std::fmt;

/// Opaque identifier for a connection, unique for the process lifetime.
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
    fn test_connection_id_round_trip_and_display() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
        assert_eq!(id.to_string(), "conn-42");
    }

    #[test]
    fn test_connection_id_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
