//! Error types for the protocol layer.

/// Errors that can occur while decoding or interpreting a frame.
///
/// A `ProtocolError` always means the *packet* was bad, never the
/// connection: the dispatcher drops the offending frame and keeps the
/// socket open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The text frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame parsed, but is not a JSON array.
    #[error("frame is not an array")]
    NotAnArray,

    /// The array is empty or its first element is not a string opcode.
    #[error("frame has no string opcode")]
    MissingOpcode,

    /// The opcode is not in the inbound table.
    #[error("unknown inbound opcode {0:?}")]
    UnknownOpcode(String),

    /// A required positional argument or object field is absent.
    #[error("opcode {0:?}: missing argument {1:?}")]
    MissingArgument(&'static str, &'static str),

    /// An argument is present but has the wrong JSON type
    /// (e.g. a non-boolean where a boolean is required).
    #[error("opcode {0:?}: argument {1:?} has the wrong type")]
    WrongArgumentType(&'static str, &'static str),
}
