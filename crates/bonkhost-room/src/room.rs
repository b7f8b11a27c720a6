//! The room actor: one Tokio task that owns every piece of mutable room
//! state and processes one command at a time.
//!
//! Connection tasks never touch the room directly — they forward raw
//! frames and lifecycle events through the command channel, and receive
//! outbound frames on per-connection unbounded senders. Limiter timers
//! re-enter through the same channel, so no reset ever races a handler.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bonkhost_protocol::{ActionKey, PlayerId, ServerMessage};
use regex::Regex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::limiter::{Expiry, RateLimiter};
use crate::players::PlayerTable;
use crate::state::RoomState;
use crate::{BanStore, ChatLog, RoomError, ServerConfig};

/// Identifies one socket for the lifetime of the process. Assigned by
/// the transport; opaque here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the room pushes to a connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    Frame(String),
    /// Close the socket (kick/ban).
    Close,
}

/// Per-connection outbound channel. Unbounded: frames are small and the
/// writer task drains continuously; a dead receiver just drops sends.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// A row of `list_players` output.
#[derive(Debug, Clone)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub user_name: String,
    pub guest: bool,
    pub level: Value,
    pub team: u8,
    pub addr: IpAddr,
}

/// Room metadata for the HTTP endpoint.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_name: String,
    pub has_password: bool,
    pub players: usize,
    pub max_players: usize,
    pub engine: String,
    pub mode: String,
}

pub(crate) enum RoomCommand {
    Connected {
        conn: ConnId,
        addr: IpAddr,
        sender: OutboundSender,
    },
    Frame {
        conn: ConnId,
        text: String,
    },
    Disconnected {
        conn: ConnId,
    },
    LimiterExpired {
        addr: IpAddr,
        action: ActionKey,
        kind: Expiry,
    },
    ForceClose {
        generation: u64,
    },
    // Admin surface, invoked by the external console.
    TransferHost {
        target: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Kick {
        target: PlayerId,
        ban: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Unban {
        username: String,
        reply: oneshot::Sender<Result<bool, RoomError>>,
    },
    ListPlayers {
        reply: oneshot::Sender<Vec<PlayerSummary>>,
    },
    SetRoomName {
        name: String,
    },
    SetPassword {
        password: Option<String>,
    },
    SaveChatLog {
        reply: oneshot::Sender<Result<PathBuf, RoomError>>,
    },
    ScheduledClose {
        minutes: Option<u64>,
    },
    AbortScheduledClose,
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

/// Handle to the running room task. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| RoomError::Unavailable)
    }

    /// Registers a freshly accepted connection.
    pub async fn connected(
        &self,
        conn: ConnId,
        addr: IpAddr,
        sender: OutboundSender,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Connected { conn, addr, sender }).await
    }

    /// Delivers one raw text frame from a connection.
    pub async fn frame(&self, conn: ConnId, text: String) -> Result<(), RoomError> {
        self.send(RoomCommand::Frame { conn, text }).await
    }

    /// Reports a closed connection.
    pub async fn disconnected(&self, conn: ConnId) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnected { conn }).await
    }

    /// Admin: hands the host seat to `target`, or empties it with
    /// [`PlayerId::NONE`]. The broadcast carries the `-1` sentinel as
    /// `oldHost` so clients can tell the console did it.
    pub async fn transfer_host(&self, target: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::TransferHost { target, reply })
            .await?
    }

    /// Admin: disconnect without banning.
    pub async fn kick_player(&self, target: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Kick {
            target,
            ban: false,
            reply,
        })
        .await?
    }

    /// Admin: ban (address + username, persisted) and disconnect.
    pub async fn ban_player(&self, target: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Kick {
            target,
            ban: true,
            reply,
        })
        .await?
    }

    /// Admin: removes a ban by username. `Ok(false)` when no entry
    /// matched.
    pub async fn unban(&self, username: String) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::Unban { username, reply })
            .await?
    }

    pub async fn list_players(&self) -> Result<Vec<PlayerSummary>, RoomError> {
        self.request(|reply| RoomCommand::ListPlayers { reply }).await
    }

    pub async fn set_room_name(&self, name: String) -> Result<(), RoomError> {
        self.send(RoomCommand::SetRoomName { name }).await
    }

    pub async fn set_password(&self, password: Option<String>) -> Result<(), RoomError> {
        self.send(RoomCommand::SetPassword { password }).await
    }

    /// Admin: flush the chat buffer to disk; returns the file written.
    pub async fn save_chat_log(&self) -> Result<PathBuf, RoomError> {
        self.request(|reply| RoomCommand::SaveChatLog { reply }).await?
    }

    /// Admin: stop admitting joins, strip the host, and shut the server
    /// down once the room empties — or after `minutes`, whichever comes
    /// first.
    pub async fn scheduled_close(&self, minutes: Option<u64>) -> Result<(), RoomError> {
        self.send(RoomCommand::ScheduledClose { minutes }).await
    }

    pub async fn abort_scheduled_close(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::AbortScheduledClose).await
    }

    /// Room metadata for the HTTP endpoint.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }
}

pub(crate) struct ConnEntry {
    pub(crate) addr: IpAddr,
    pub(crate) sender: OutboundSender,
    pub(crate) player: Option<PlayerId>,
}

pub(crate) struct RoomActor {
    pub(crate) cfg: Arc<ServerConfig>,
    pub(crate) username_regex: Option<Regex>,
    pub(crate) state: RoomState,
    pub(crate) players: PlayerTable,
    pub(crate) limiter: RateLimiter,
    pub(crate) bans: BanStore,
    pub(crate) chat: ChatLog,
    pub(crate) conns: HashMap<ConnId, ConnEntry>,
    tx: mpsc::Sender<RoomCommand>,
    rx: mpsc::Receiver<RoomCommand>,
    close_generation: u64,
    shutdown: Option<oneshot::Sender<()>>,
    stopping: bool,
}

/// Spawns the room task.
///
/// Loads the ban list, compiles the username restriction, and prepares
/// the chat log — all fatal if broken. The returned receiver resolves
/// when a scheduled close finishes.
pub fn spawn_room(
    cfg: Arc<ServerConfig>,
) -> Result<(RoomHandle, oneshot::Receiver<()>), RoomError> {
    let username_regex = cfg.compile_username_regex()?;
    let bans = BanStore::load(&cfg.ban_list_path)?;
    let chat = ChatLog::new(&cfg.chat_log_dir, &cfg.time_stamp_format)?;

    let (tx, rx) = mpsc::channel(256);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let actor = RoomActor {
        state: RoomState::new(&cfg),
        username_regex,
        players: PlayerTable::new(),
        limiter: RateLimiter::new(),
        bans,
        chat,
        conns: HashMap::new(),
        tx: tx.clone(),
        rx,
        close_generation: 0,
        shutdown: Some(shutdown_tx),
        stopping: false,
        cfg,
    };
    tokio::spawn(actor.run());

    Ok((RoomHandle { sender: tx }, shutdown_rx))
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room = %self.state.room_name, "room task started");

        while let Some(cmd) = self.rx.recv().await {
            self.handle_command(cmd);
            if self.stopping {
                break;
            }
        }

        // Flush whatever the chat buffer holds; losing lines on shutdown
        // defeats the point of the log.
        if !self.chat.lines().is_empty() {
            if let Err(e) = self.chat.save() {
                tracing::warn!(error = %e, "failed to save chat log on shutdown");
            }
        }
        if let Some(signal) = self.shutdown.take() {
            let _ = signal.send(());
        }
        tracing::info!("room task stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Connected { conn, addr, sender } => {
                tracing::debug!(%conn, %addr, "connection registered");
                self.conns.insert(
                    conn,
                    ConnEntry {
                        addr,
                        sender,
                        player: None,
                    },
                );
            }
            RoomCommand::Frame { conn, text } => self.handle_frame(conn, &text),
            RoomCommand::Disconnected { conn } => self.handle_disconnected(conn),
            RoomCommand::LimiterExpired { addr, action, kind } => {
                let rule = self.cfg.restrictions.ratelimits.rule(action).clone();
                self.limiter.expired(addr, action, kind, &rule);
            }
            RoomCommand::ForceClose { generation } => {
                if self.state.closed && generation == self.close_generation {
                    tracing::info!("scheduled close deadline reached");
                    self.stopping = true;
                }
            }
            RoomCommand::TransferHost { target, reply } => {
                let _ = reply.send(self.admin_transfer_host(target));
            }
            RoomCommand::Kick { target, ban, reply } => {
                let _ = reply.send(self.admin_kick(target, ban));
            }
            RoomCommand::Unban { username, reply } => {
                let _ = reply.send(self.bans.remove_by_username(&username));
            }
            RoomCommand::ListPlayers { reply } => {
                let summaries = self
                    .players
                    .iter()
                    .map(|(id, p)| PlayerSummary {
                        id,
                        user_name: p.user_name.clone(),
                        guest: p.guest,
                        level: p.level.clone(),
                        team: p.team,
                        addr: p.addr,
                    })
                    .collect();
                let _ = reply.send(summaries);
            }
            RoomCommand::SetRoomName { name } => {
                tracing::info!(%name, "room renamed");
                self.state.room_name = name;
            }
            RoomCommand::SetPassword { password } => {
                tracing::info!(set = password.is_some(), "room password changed");
                self.state.password = password;
            }
            RoomCommand::SaveChatLog { reply } => {
                let _ = reply.send(self.chat.save());
            }
            RoomCommand::ScheduledClose { minutes } => self.scheduled_close(minutes),
            RoomCommand::AbortScheduledClose => {
                tracing::info!("scheduled close aborted");
                self.state.closed = false;
                self.close_generation += 1;
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(RoomSnapshot {
                    room_name: self.state.room_name.clone(),
                    has_password: self.state.password.is_some(),
                    players: self.players.count(),
                    max_players: self.cfg.max_players,
                    engine: self.state.settings.ga.clone(),
                    mode: self.state.settings.mo.clone(),
                });
            }
        }
    }

    // -- outbound plumbing ------------------------------------------------

    pub(crate) fn send_to_conn(&self, conn: ConnId, msg: &ServerMessage) {
        if let Some(entry) = self.conns.get(&conn) {
            let _ = entry.sender.send(Outbound::Frame(msg.to_frame()));
        }
    }

    pub(crate) fn unicast(&self, player: PlayerId, msg: &ServerMessage) {
        if let Some(slot) = self.players.get(player) {
            self.send_to_conn(slot.conn, msg);
        }
    }

    /// Sends to every player in id order.
    pub(crate) fn broadcast(&self, msg: &ServerMessage) {
        let frame = msg.to_frame();
        for (_, slot) in self.players.iter() {
            if let Some(entry) = self.conns.get(&slot.conn) {
                let _ = entry.sender.send(Outbound::Frame(frame.clone()));
            }
        }
    }

    pub(crate) fn broadcast_except(&self, except: PlayerId, msg: &ServerMessage) {
        let frame = msg.to_frame();
        for (id, slot) in self.players.iter() {
            if id == except {
                continue;
            }
            if let Some(entry) = self.conns.get(&slot.conn) {
                let _ = entry.sender.send(Outbound::Frame(frame.clone()));
            }
        }
    }

    // -- ratelimiting ------------------------------------------------------

    /// Runs the limiter for one action. Returns whether the action may
    /// proceed; on refusal the mapped error code (if the class has one)
    /// has already been sent.
    pub(crate) fn check_ratelimit(
        &mut self,
        conn: ConnId,
        addr: IpAddr,
        action: ActionKey,
    ) -> bool {
        let rule = self.cfg.restrictions.ratelimits.rule(action).clone();
        let hit = self.limiter.hit(addr, action, &rule);
        if hit.arm_timeframe {
            self.arm_limiter_timer(addr, action, Expiry::Timeframe, rule.timeframe);
        }
        if hit.arm_restore {
            self.arm_limiter_timer(addr, action, Expiry::Restore, rule.restore);
        }
        if hit.limited {
            tracing::debug!(%addr, %action, "action refused by ratelimiter");
            if let Some(code) = action.error_code() {
                self.send_to_conn(conn, &ServerMessage::Error { code });
            }
        }
        !hit.limited
    }

    fn arm_limiter_timer(&self, addr: IpAddr, action: ActionKey, kind: Expiry, secs: u64) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            // The room may already be gone; an unresettable counter in a
            // dead room is harmless.
            let _ = tx
                .send(RoomCommand::LimiterExpired { addr, action, kind })
                .await;
        });
    }

    // -- leave / disconnect ------------------------------------------------

    fn handle_disconnected(&mut self, conn: ConnId) {
        let Some(entry) = self.conns.remove(&conn) else {
            return;
        };
        let Some(id) = entry.player else {
            tracing::debug!(%conn, "unadmitted connection closed");
            return;
        };
        let Some(slot) = self.players.release(id) else {
            return;
        };

        let was_host = id == self.state.host_id;
        let tick_count = self.tick_count();

        if was_host && self.cfg.auto_assign_host {
            let new_host = self
                .players
                .iter()
                .map(|(pid, _)| pid)
                .next()
                .unwrap_or(PlayerId::NONE);
            self.state.host_id = new_host;
            self.broadcast(&ServerMessage::HostLeft {
                old_host: id,
                new_host,
                tick_count,
            });
            self.chat
                .append(&format!("* {} left the game", slot.user_name));
            if let Some(next) = self.players.get(new_host) {
                self.chat
                    .append(&format!("* {} is now the game host", next.user_name));
            }
            tracing::info!(%id, %new_host, name = %slot.user_name, "host left, seat reassigned");
        } else {
            if was_host {
                self.state.host_id = PlayerId::NONE;
            }
            self.broadcast(&ServerMessage::PlayerLeft { id, tick_count });
            self.chat
                .append(&format!("* {} left the game", slot.user_name));
            tracing::info!(%id, name = %slot.user_name, "player left");
        }

        if self.state.closed && self.players.count() == 0 {
            tracing::info!("room emptied during scheduled close");
            self.stopping = true;
        }
    }

    // -- admin operations --------------------------------------------------

    fn admin_transfer_host(&mut self, target: PlayerId) -> Result<(), RoomError> {
        if !target.is_none() && self.players.get(target).is_none() {
            return Err(RoomError::NoSuchPlayer(target));
        }
        self.state.host_id = target;
        self.broadcast(&ServerMessage::HostTransferred {
            old_host: PlayerId::NONE,
            new_host: target,
        });
        if let Some(slot) = self.players.get(target) {
            self.chat
                .append(&format!("* {} is now the game host", slot.user_name));
        }
        tracing::info!(%target, "host seat set by console");
        Ok(())
    }

    pub(crate) fn admin_kick(&mut self, target: PlayerId, ban: bool) -> Result<(), RoomError> {
        let Some(slot) = self.players.get(target) else {
            return Err(RoomError::NoSuchPlayer(target));
        };
        let name = slot.user_name.clone();
        let conn = slot.conn;
        let addr = slot.addr;

        if ban {
            self.bans.add(addr.to_string(), name.clone())?;
            self.chat
                .append(&format!("* {name} has been banned from the game"));
            tracing::info!(%target, %name, %addr, "player banned");
        } else {
            self.chat
                .append(&format!("* {name} has been kicked from the game"));
            tracing::info!(%target, %name, "player kicked");
        }

        // Closing the socket makes the reader task report the disconnect,
        // which releases the slot and broadcasts the leave.
        if let Some(entry) = self.conns.get(&conn) {
            let _ = entry.sender.send(Outbound::Close);
        }
        Ok(())
    }

    fn scheduled_close(&mut self, minutes: Option<u64>) {
        tracing::info!(?minutes, "scheduled close started");
        self.state.closed = true;
        self.close_generation += 1;

        if !self.state.host_id.is_none() {
            // Strip the host; the console owns the room from here on.
            let _ = self.admin_transfer_host(PlayerId::NONE);
        }

        if let Some(minutes) = minutes {
            let generation = self.close_generation;
            let tx = self.tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
                let _ = tx.send(RoomCommand::ForceClose { generation }).await;
            });
        }

        if self.players.count() == 0 {
            self.stopping = true;
        }
    }

    // -- time --------------------------------------------------------------

    pub(crate) fn tick_count(&self) -> u64 {
        let elapsed = now_ms().saturating_sub(self.state.game_start_time);
        (elapsed as f64 / (1000.0 / 30.0)).round() as u64
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
