//! The connection admission pipeline.
//!
//! Runs on a connection's join request. Stages run in a fixed order;
//! the first failing stage sends its coded `ERROR_MESSAGE` and stops —
//! the socket stays open, no slot is created. The client decides what
//! to do with the rejection.

use std::net::IpAddr;

use bonkhost_protocol::{team, ActionKey, ErrorCode, ServerMessage};
use serde_json::{json, Value};

use crate::players::PlayerSlot;
use crate::room::{ConnId, RoomActor};

impl RoomActor {
    pub(crate) fn handle_join_request(
        &mut self,
        conn: ConnId,
        user_name: String,
        guest: bool,
        level: Value,
        avatar: Value,
        room_password: Option<String>,
    ) {
        let Some(entry) = self.conns.get(&conn) else {
            return;
        };
        let addr = entry.addr;

        let reject = |actor: &RoomActor, code: ErrorCode| {
            tracing::info!(%conn, %addr, name = %user_name, %code, "join rejected");
            actor.send_to_conn(conn, &ServerMessage::Error { code });
        };

        if self.state.closed {
            return reject(self, ErrorCode::RoomClosed);
        }
        if self.bans.is_banned(&addr.to_string()) {
            return reject(self, ErrorCode::Banned);
        }
        if entry.player.is_some() {
            // Already admitted; a second join request is noise.
            return;
        }
        if !self.check_ratelimit(conn, addr, ActionKey::Joining) {
            return;
        }

        let usernames = &self.cfg.restrictions.usernames;
        if usernames.no_duplicates && self.players.find_by_name(&user_name).is_some() {
            return reject(self, ErrorCode::AlreadyInThisRoom);
        }
        if user_name.chars().count() > usernames.max_length {
            return reject(self, ErrorCode::UsernameTooLong);
        }
        if usernames.no_empty_names && user_name.is_empty() {
            return reject(self, ErrorCode::UsernameEmpty);
        }
        if let Some(pattern) = &self.username_regex {
            if pattern.is_match(&user_name) {
                return reject(self, ErrorCode::UsernameInvalid);
            }
        }

        let levels = &self.cfg.restrictions.levels;
        if levels.min_level > 0 && guest {
            return reject(self, ErrorCode::GuestsNotAllowed);
        }
        if let Some(value) = numeric_level(&level) {
            if value < levels.min_level {
                return reject(self, ErrorCode::PlayersXpTooLow);
            }
            if value > levels.max_level {
                return reject(self, ErrorCode::PlayersXpTooHigh);
            }
        }
        if levels.only_allow_numbers && !level_is_all_digits(&level) {
            return reject(self, ErrorCode::PlayerXpInvalid);
        }

        if let Some(expected) = &self.state.password {
            if room_password.as_deref() != Some(expected.as_str()) {
                return reject(self, ErrorCode::PasswordWrong);
            }
        }
        if self.players.count() >= self.cfg.max_players {
            return reject(self, ErrorCode::RoomFull);
        }

        self.admit(conn, addr, user_name, guest, level, avatar);
    }

    fn admit(
        &mut self,
        conn: ConnId,
        addr: IpAddr,
        user_name: String,
        guest: bool,
        level: Value,
        avatar: Value,
    ) {
        let stored_level = if self.cfg.restrictions.levels.censor_levels {
            json!("-")
        } else {
            level
        };
        let initial_team = if self.state.settings.tl {
            team::SPECTATE
        } else {
            team::FFA
        };

        let id = self.players.allocate(PlayerSlot {
            user_name: user_name.clone(),
            guest,
            level: stored_level.clone(),
            team: initial_team,
            avatar: avatar.clone(),
            ready: false,
            tabbed: false,
            conn,
            addr,
        });
        if let Some(entry) = self.conns.get_mut(&conn) {
            entry.player = Some(id);
        }

        let auto_host = self.state.host_id.is_none() && self.cfg.auto_assign_host;
        if auto_host {
            self.state.host_id = id;
        }

        self.send_to_conn(
            conn,
            &ServerMessage::ServerInform {
                your_id: id,
                host_id: self.state.host_id,
                players: self.players.to_wire(),
                game_start_time: self.state.game_start_time,
                teams_locked: self.state.settings.tl,
            },
        );
        self.broadcast_except(
            id,
            &ServerMessage::PlayerJoined {
                id,
                user_name: user_name.clone(),
                guest,
                level: stored_level,
                team: initial_team,
                avatar,
            },
        );
        self.chat.append(&format!("* {user_name} joined the game"));

        if auto_host {
            // No host existed, so nobody can sync settings to the new
            // player; the server fabricates the host packet itself.
            self.unicast(
                id,
                &ServerMessage::HostInformInLobby {
                    settings: self.state.settings.to_value(),
                },
            );
        }

        tracing::info!(
            %id,
            name = %user_name,
            %addr,
            host = auto_host,
            players = self.players.count(),
            "player joined"
        );
        debug_assert!(host_invariant_holds(self));
    }
}

/// The level as an integer, when it is one (a JSON number or a string
/// of one). Non-numeric levels skip the min/max stages; the
/// `onlyAllowNumbers` stage is what judges them.
fn numeric_level(level: &Value) -> Option<i64> {
    match level {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn level_is_all_digits(level: &Value) -> bool {
    match level {
        Value::Number(n) => n.as_u64().is_some(),
        Value::String(s) => !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// At most one slot may hold the host id (invariant checked after every
/// admission in debug builds).
fn host_invariant_holds(actor: &RoomActor) -> bool {
    actor.state.host_id.is_none()
        || actor
            .players
            .iter()
            .filter(|(id, _)| *id == actor.state.host_id)
            .count()
            == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonkhost_protocol::PlayerId;

    #[test]
    fn test_numeric_level_accepts_numbers_and_numeric_strings() {
        assert_eq!(numeric_level(&json!(5)), Some(5));
        assert_eq!(numeric_level(&json!("17")), Some(17));
        assert_eq!(numeric_level(&json!("-3")), Some(-3));
        assert_eq!(numeric_level(&json!("12a")), None);
        assert_eq!(numeric_level(&Value::Null), None);
    }

    #[test]
    fn test_level_digit_check() {
        assert!(level_is_all_digits(&json!(42)));
        assert!(level_is_all_digits(&json!("42")));
        assert!(!level_is_all_digits(&json!("4 2")));
        assert!(!level_is_all_digits(&json!("-1")));
        assert!(!level_is_all_digits(&json!("")));
        assert!(!level_is_all_digits(&Value::Null));
    }

    #[test]
    fn test_player_id_none_is_sentinel() {
        assert!(PlayerId::NONE.is_none());
        assert!(!PlayerId(0).is_none());
    }
}
