//! Unified error type for the bonkhost server.

use bonkhost_room::RoomError;
use bonkhost_transport::TransportError;

/// Top-level error wrapping the layer-specific ones.
///
/// The `#[from]` impls let `?` convert sub-crate errors automatically,
/// so the binary and the accept loop deal with a single type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level failure (bind, accept, TLS material).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A room-engine failure (persistence, configuration, admin ops).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_room_error() {
        let err: ServerError = RoomError::InvalidConfig("bad".into()).into();
        assert!(matches!(err, ServerError::Room(_)));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_transport_error() {
        let err: ServerError = TransportError::TlsMaterial("no key".into()).into();
        assert!(matches!(err, ServerError::Transport(_)));
    }
}
