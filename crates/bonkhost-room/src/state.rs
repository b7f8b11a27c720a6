//! Room-wide fields.
//!
//! A plain container: invariant maintenance lives in the dispatcher and
//! the admin operations, not here.

use bonkhost_protocol::PlayerId;

use crate::{GameSettings, ServerConfig};

#[derive(Debug, Clone)]
pub struct RoomState {
    /// The single player allowed to mutate settings; `PlayerId::NONE`
    /// when the seat is empty.
    pub host_id: PlayerId,
    pub room_name: String,
    pub password: Option<String>,
    pub settings: GameSettings,
    /// Wall-clock ms of the last game start; 0 means lobby.
    pub game_start_time: u64,
    /// Set by a scheduled close; the admission pipeline rejects every
    /// join while this is up.
    pub closed: bool,
}

impl RoomState {
    pub fn new(cfg: &ServerConfig) -> Self {
        Self {
            host_id: PlayerId::NONE,
            room_name: cfg.room_name_on_startup.clone(),
            password: cfg.room_password_on_startup.clone(),
            settings: cfg.default_game_settings.clone(),
            game_start_time: 0,
            closed: false,
        }
    }

    pub fn in_lobby(&self) -> bool {
        self.game_start_time == 0
    }
}
