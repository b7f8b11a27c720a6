//! Error types for the room engine.

use std::path::PathBuf;

use bonkhost_protocol::PlayerId;

/// Errors that can occur in the room layer.
///
/// Wire-level rejections (bad password, room full, ratelimited, …) are
/// NOT errors — they are `ERROR_MESSAGE` packets produced by the
/// dispatcher. This enum covers the engine's own failures: persistence,
/// bad configuration, and admin operations on missing players.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Reading or writing a durable file failed.
    #[error("i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted document did not parse.
    #[error("malformed document {path}: {source}")]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is unusable (bad regex, bad time format).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An admin operation referenced an id with no occupied slot.
    #[error("no player with id {0}")]
    NoSuchPlayer(PlayerId),

    /// The room task is gone — its command channel is closed.
    #[error("room is unavailable")]
    Unavailable,
}
