//! Wire protocol for the bonkhost room server.
//!
//! This crate defines the dialect unmodified game clients speak:
//!
//! - **Codec** ([`codec::decode`], [`codec::encode`]) — JSON-array text
//!   frames with a numeric-string opcode in slot 0.
//! - **Tables** ([`inbound`], [`outbound`]) — the two disjoint opcode
//!   namespaces, byte-for-byte fixed.
//! - **Typed messages** ([`ClientMessage`], [`ServerMessage`]) — what the
//!   dispatcher actually consumes and produces.
//! - **Gating metadata** ([`ActionKey`], [`ErrorCode`],
//!   [`ClientMessage::requires_host`]) — the ratelimit action-class and
//!   host-only tables, kept here so they live next to the opcodes they
//!   describe.
//!
//! The protocol layer knows nothing about connections or room state; it
//! only converts between text and typed packets.

pub mod codec;
mod error;
mod types;

pub use codec::Frame;
pub use error::ProtocolError;
pub use types::{
    inbound, outbound, team, ActionKey, ClientMessage, ErrorCode, PlayerId,
    ServerMessage,
};
