//! The dispatcher: routes decoded inbound packets to their handlers.
//!
//! Two universal preconditions run before any handler-specific logic:
//! the opcode's ratelimit action class (if it has one), then host
//! gating. Validation happens before mutation, so a dropped packet
//! never leaves the room half-changed.

use bonkhost_protocol::{codec, ClientMessage, ErrorCode, PlayerId, ServerMessage};

use crate::room::{now_ms, ConnId, RoomActor};
use crate::GameSettings;

impl RoomActor {
    pub(crate) fn handle_frame(&mut self, conn: ConnId, text: &str) {
        let frame = match codec::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "dropping malformed frame");
                return;
            }
        };
        let msg = match ClientMessage::from_frame(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "dropping bad packet");
                return;
            }
        };

        let msg = match msg {
            // Timesync answers before admission completes.
            ClientMessage::Timesync { id } => {
                self.send_to_conn(
                    conn,
                    &ServerMessage::Timesync {
                        id,
                        result: now_ms(),
                    },
                );
                return;
            }
            ClientMessage::JoinRequest {
                user_name,
                guest,
                level,
                avatar,
                room_password,
            } => {
                self.handle_join_request(conn, user_name, guest, level, avatar, room_password);
                return;
            }
            other => other,
        };

        // Everything else needs a seat in the room.
        let Some(entry) = self.conns.get(&conn) else {
            return;
        };
        let Some(sender) = entry.player else {
            tracing::debug!(%conn, opcode = %frame.opcode, "packet before admission, dropping");
            return;
        };
        let addr = entry.addr;

        if let Some(action) = msg.action_class() {
            if !self.check_ratelimit(conn, addr, action) {
                return;
            }
        }

        let is_host = sender == self.state.host_id;
        if msg.requires_host() && !is_host {
            tracing::debug!(%sender, opcode = %frame.opcode, "host-only packet from non-host");
            self.send_to_conn(
                conn,
                &ServerMessage::Error {
                    code: ErrorCode::NotHosting,
                },
            );
            return;
        }

        self.dispatch(conn, sender, is_host, msg);
    }

    fn dispatch(&mut self, conn: ConnId, sender: PlayerId, is_host: bool, msg: ClientMessage) {
        match msg {
            ClientMessage::ChangeOwnTeam { team } => {
                // Locked teams turn this into a host-only action.
                if self.state.settings.tl && !is_host {
                    self.send_to_conn(
                        conn,
                        &ServerMessage::Error {
                            code: ErrorCode::NotHosting,
                        },
                    );
                    return;
                }
                if let Some(slot) = self.players.get_mut(sender) {
                    slot.team = team;
                }
                self.broadcast(&ServerMessage::TeamChanged { id: sender, team });
            }

            ClientMessage::Chat { message } => {
                let max = self.cfg.restrictions.max_chat_message_length;
                let message: String = message.chars().take(max).collect();
                self.broadcast(&ServerMessage::Chat {
                    id: sender,
                    message: message.clone(),
                });
                if let Some(slot) = self.players.get(sender) {
                    self.chat
                        .append(&format!("{}: {message}", slot.user_name));
                }
            }

            ClientMessage::SetReady { ready } => {
                if let Some(slot) = self.players.get_mut(sender) {
                    slot.ready = ready;
                }
                self.broadcast(&ServerMessage::ReadySet { id: sender, ready });
            }

            ClientMessage::MapRequest {
                map,
                map_name,
                map_author,
            } => {
                let preview = ServerMessage::MapRequestNonHost {
                    map_name: map_name.clone(),
                    map_author: map_author.clone(),
                    sender,
                };
                if self.state.host_id.is_none() {
                    self.broadcast(&preview);
                } else {
                    // Host gets the full payload, everyone else just the
                    // metadata.
                    self.broadcast_except(self.state.host_id, &preview);
                    self.unicast(
                        self.state.host_id,
                        &ServerMessage::MapRequestHost { map, sender },
                    );
                }
                if let Some(slot) = self.players.get(sender) {
                    self.chat.append(&format!(
                        "* {} has requested the map {map_name} by {map_author}",
                        slot.user_name
                    ));
                }
            }

            ClientMessage::FriendRequest { target } => {
                self.unicast(target, &ServerMessage::FriendRequest { sender });
            }

            ClientMessage::SetTabbed { tabbed } => {
                if let Some(slot) = self.players.get_mut(sender) {
                    slot.tabbed = tabbed;
                }
                self.broadcast(&ServerMessage::TabbedSet { id: sender, tabbed });
            }

            ClientMessage::LockTeams { locked } => {
                self.state.settings.tl = locked;
                self.broadcast(&ServerMessage::TeamsLocked { locked });
            }

            ClientMessage::KickBan { target, kick_only } => {
                if let Err(e) = self.admin_kick(target, !kick_only) {
                    tracing::debug!(%sender, %target, error = %e, "kick/ban failed");
                }
            }

            ClientMessage::ChangeMode { engine, mode } => {
                self.state.settings.ga = engine.clone();
                self.state.settings.mo = mode.clone();
                self.broadcast(&ServerMessage::ModeChanged { engine, mode });
            }

            ClientMessage::ChangeRounds { rounds } => {
                self.state.settings.wl = rounds;
                self.broadcast(&ServerMessage::RoundsChanged { rounds });
            }

            ClientMessage::ChangeMap { map } => {
                self.state.settings.map = map.clone();
                self.broadcast(&ServerMessage::MapChanged { map });
            }

            ClientMessage::ChangeOtherTeam { target, team } => {
                let Some(slot) = self.players.get_mut(target) else {
                    return;
                };
                slot.team = team;
                self.broadcast(&ServerMessage::TeamChanged { id: target, team });
            }

            ClientMessage::ChangeBalance { target, balance } => {
                self.state.settings.bal.insert(target.0, balance);
                self.broadcast(&ServerMessage::BalanceChanged {
                    id: target,
                    balance,
                });
            }

            ClientMessage::ToggleTeams { on } => {
                self.state.settings.tea = on;
                self.broadcast(&ServerMessage::TeamsToggled { on });
            }

            ClientMessage::TransferHost { target } => {
                let Some(next) = self.players.get(target) else {
                    tracing::debug!(%sender, %target, "host transfer to empty slot, dropping");
                    return;
                };
                let next_name = next.user_name.clone();
                let old_host = self.state.host_id;
                self.state.host_id = target;
                self.broadcast(&ServerMessage::HostTransferred {
                    old_host,
                    new_host: target,
                });
                self.chat
                    .append(&format!("* {next_name} is now the game host"));
                tracing::info!(%old_host, new_host = %target, "host transferred");
            }

            ClientMessage::CountdownStart { payload } => {
                self.broadcast(&ServerMessage::CountdownStarting { payload });
            }
            ClientMessage::CountdownAbort { payload } => {
                self.broadcast(&ServerMessage::CountdownAborted { payload });
            }

            ClientMessage::InformInLobby { target, settings } => {
                self.unicast(target, &ServerMessage::HostInformInLobby { settings });
            }
            ClientMessage::InformInGame { target, data } => {
                self.unicast(target, &ServerMessage::HostInformInGame { data });
            }

            ClientMessage::Inputs { data } => {
                self.broadcast_except(sender, &ServerMessage::Inputs { sender, data });
            }

            ClientMessage::StartGame {
                in_game_state,
                settings,
            } => {
                let settings = match GameSettings::from_value(settings) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::debug!(%sender, error = %e, "unusable game settings, dropping");
                        return;
                    }
                };
                self.state.settings = settings;
                self.state.game_start_time = now_ms();
                self.broadcast(&ServerMessage::GameStarted {
                    game_start_time: self.state.game_start_time,
                    in_game_state,
                    settings: self.state.settings.to_value(),
                });
                tracing::info!("game started");
            }

            ClientMessage::ReturnToLobby => {
                self.state.game_start_time = 0;
                self.broadcast(&ServerMessage::ReturnedToLobby);
                tracing::info!("returned to lobby");
            }

            ClientMessage::SaveReplay => {
                self.broadcast(&ServerMessage::ReplaySaved { sender });
            }

            // Handled before dispatch.
            ClientMessage::JoinRequest { .. } | ClientMessage::Timesync { .. } => {}
        }
    }
}
