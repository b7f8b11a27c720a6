//! The bonkhost room engine.
//!
//! One process hosts one room. All mutable room state — player table,
//! host seat, game settings, ratelimit counters, ban list, chat log —
//! lives inside a single actor task ([`spawn_room`]); the rest of the
//! server talks to it through a [`RoomHandle`]. See the crate layout:
//!
//! - [`config`] — the startup document, restrictions, ratelimit rules
//! - [`players`] — the sparse slot table (monotonic ids)
//! - [`state`] — room-wide fields (host, name, password, settings)
//! - [`limiter`] — per-address token buckets
//! - [`bans`] / [`chatlog`] — the two durable files
//! - `admission` / `dispatch` — the join pipeline and opcode handlers,
//!   both implemented on the room actor

mod admission;
mod bans;
mod chatlog;
pub mod config;
mod dispatch;
mod error;
mod limiter;
pub mod players;
mod room;
mod settings;
mod state;

pub use bans::{BanList, BanStore};
pub use chatlog::ChatLog;
pub use config::{Restrictions, ServerConfig};
pub use error::RoomError;
pub use limiter::{Expiry, Hit, RateLimiter};
pub use room::{
    spawn_room, ConnId, Outbound, OutboundSender, PlayerSummary, RoomHandle, RoomSnapshot,
};
pub use settings::GameSettings;
pub use state::RoomState;
