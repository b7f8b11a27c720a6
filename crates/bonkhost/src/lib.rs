//! # bonkhost
//!
//! A self-hosted realtime game-room server speaking the wire protocol
//! of the browser game bonk.io. One process hosts one room; unmodified
//! game clients connect over WebSocket, pass the admission pipeline,
//! and see a consistent room fanned out by the dispatcher.
//!
//! This meta crate ties the layers together:
//!
//! ```text
//! transport (frames)  →  room (admission, dispatch, state)  →  transport
//! ```
//!
//! See [`Server`] for assembly and the accept loop; the admin console
//! drives the room through [`bonkhost_room::RoomHandle`].

mod error;
mod handler;
mod server;

pub use error::ServerError;
pub use server::Server;

/// Re-exports everything the binary, console, and tests need.
pub mod prelude {
    pub use crate::{Server, ServerError};

    pub use bonkhost_protocol::{
        codec, inbound, outbound, ActionKey, ClientMessage, ErrorCode, Frame, PlayerId,
        ProtocolError, ServerMessage,
    };

    pub use bonkhost_room::{
        BanList, BanStore, ChatLog, ConnId, GameSettings, Outbound, PlayerSummary,
        RoomError, RoomHandle, RoomSnapshot, RoomState, ServerConfig,
    };

    pub use bonkhost_transport::{
        ConnectionId, Incoming, Listener, TransportError, WsConnection,
    };
}
