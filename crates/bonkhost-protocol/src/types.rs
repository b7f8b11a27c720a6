//! The two opcode tables and their typed message forms.
//!
//! Inbound (client → server) and outbound (server → client) opcodes are
//! disjoint namespaces; both tables below are authoritative and must not
//! drift — unmodified game clients speak exactly this vocabulary. The
//! dispatcher never touches raw frames: inbound frames become a
//! [`ClientMessage`], outbound packets are built as a [`ServerMessage`]
//! and rendered with [`ServerMessage::to_frame`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::codec::{self, Frame};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A player's slot id within the room.
///
/// Ids are assigned monotonically and never recycled while the process
/// lives; `-1` is the "no player" sentinel (used for "no host").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i32);

impl PlayerId {
    /// Sentinel meaning "no player" (e.g. a room without a host).
    pub const NONE: PlayerId = PlayerId(-1);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team slots. 0 = Spectate, 1 = FFA, 2–5 = Red/Blue/Green/Yellow.
pub mod team {
    pub const SPECTATE: u8 = 0;
    pub const FFA: u8 = 1;
    pub const MAX: u8 = 5;
}

// ---------------------------------------------------------------------------
// Opcode tables
// ---------------------------------------------------------------------------

/// Inbound (client → server) opcodes.
pub mod inbound {
    pub const SEND_INPUTS: &str = "4";
    pub const START_GAME: &str = "5";
    pub const CHANGE_OWN_TEAM: &str = "6";
    pub const LOCK_TEAMS: &str = "7";
    pub const KICK_BAN_PLAYER: &str = "9";
    pub const CHAT_MESSAGE: &str = "10";
    pub const HOST_INFORM_IN_LOBBY: &str = "11";
    pub const JOIN_REQUEST: &str = "13";
    pub const RETURN_TO_LOBBY: &str = "14";
    pub const SET_READY: &str = "16";
    pub const TIMESYNC: &str = "18";
    pub const CHANGE_MODE: &str = "20";
    pub const CHANGE_ROUNDS: &str = "21";
    pub const CHANGE_MAP: &str = "23";
    pub const CHANGE_OTHER_TEAM: &str = "26";
    pub const MAP_REQUEST: &str = "27";
    pub const CHANGE_BALANCE: &str = "29";
    pub const TOGGLE_TEAMS: &str = "32";
    pub const SAVE_REPLAY: &str = "33";
    pub const TRANSFER_HOST: &str = "34";
    pub const FRIEND_REQUEST: &str = "35";
    pub const COUNTDOWN_STARTING: &str = "36";
    pub const COUNTDOWN_ABORTED: &str = "37";
    pub const HOST_INFORM_IN_GAME: &str = "40";
    pub const SET_TABBED: &str = "44";
}

/// Outbound (server → client) opcodes.
pub mod outbound {
    pub const SERVER_INFORM: &str = "3";
    pub const PLAYER_JOINED: &str = "4";
    pub const PLAYER_LEFT: &str = "5";
    pub const HOST_LEFT: &str = "6";
    pub const SEND_INPUTS: &str = "7";
    pub const SET_READY: &str = "8";
    pub const RETURN_TO_LOBBY: &str = "13";
    pub const START_GAME: &str = "15";
    pub const ERROR_MESSAGE: &str = "16";
    /// Shared by team changes and balance changes; the argument shape
    /// disambiguates. Existing clients expect the collision — keep it.
    pub const CHANGE_TEAM: &str = "18";
    pub const LOCK_TEAMS: &str = "19";
    pub const CHAT_MESSAGE: &str = "20";
    pub const HOST_INFORM_IN_LOBBY: &str = "21";
    pub const REPLY_TIMESYNC: &str = "23";
    pub const CHANGE_MODE: &str = "26";
    pub const CHANGE_ROUNDS: &str = "27";
    pub const CHANGE_MAP: &str = "29";
    pub const MAP_REQUEST_HOST: &str = "33";
    pub const MAP_REQUEST_NON_HOST: &str = "34";
    pub const TOGGLE_TEAMS: &str = "39";
    pub const SAVE_REPLAY: &str = "40";
    pub const TRANSFER_HOST: &str = "41";
    pub const FRIEND_REQUEST: &str = "42";
    pub const SEND_COUNTDOWN_STARTING: &str = "43";
    pub const SEND_COUNTDOWN_ABORTED: &str = "44";
    pub const HOST_INFORM_IN_GAME: &str = "48";
    pub const SET_TABBED: &str = "52";
}

// ---------------------------------------------------------------------------
// Ratelimit action classes
// ---------------------------------------------------------------------------

/// A named category of mutating operations sharing one ratelimit bucket
/// per client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKey {
    Joining,
    Chatting,
    ChangingTeams,
    Readying,
    TransferringHost,
    ChangingMode,
    ChangingMap,
    StartGameCountdown,
    StartingEndingGame,
}

impl ActionKey {
    /// The wire error code sent when this class refuses an action, or
    /// `None` for the classes that fail silently.
    pub fn error_code(self) -> Option<ErrorCode> {
        match self {
            Self::Joining => Some(ErrorCode::JoinRateLimited),
            Self::Chatting => Some(ErrorCode::ChatRateLimit),
            Self::ChangingTeams => Some(ErrorCode::RateLimitTeams),
            Self::Readying => Some(ErrorCode::RateLimitReady),
            Self::TransferringHost => Some(ErrorCode::HostChangeRateLimited),
            Self::ChangingMode
            | Self::ChangingMap
            | Self::StartGameCountdown
            | Self::StartingEndingGame => None,
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Joining => "joining",
            Self::Chatting => "chatting",
            Self::ChangingTeams => "changingTeams",
            Self::Readying => "readying",
            Self::TransferringHost => "transferringHost",
            Self::ChangingMode => "changingMode",
            Self::ChangingMap => "changingMap",
            Self::StartGameCountdown => "startGameCountdown",
            Self::StartingEndingGame => "startingEndingGame",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Literal code strings carried by `ERROR_MESSAGE (16)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    RoomClosed,
    Banned,
    JoinRateLimited,
    AlreadyInThisRoom,
    UsernameTooLong,
    UsernameEmpty,
    UsernameInvalid,
    GuestsNotAllowed,
    PlayersXpTooLow,
    PlayersXpTooHigh,
    PlayerXpInvalid,
    PasswordWrong,
    RoomFull,
    NotHosting,
    ChatRateLimit,
    RateLimitTeams,
    RateLimitReady,
    HostChangeRateLimited,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoomClosed => "room_closed",
            Self::Banned => "banned",
            Self::JoinRateLimited => "join_rate_limited",
            Self::AlreadyInThisRoom => "already_in_this_room",
            Self::UsernameTooLong => "username_too_long",
            Self::UsernameEmpty => "username_empty",
            Self::UsernameInvalid => "username_invalid",
            Self::GuestsNotAllowed => "guests_not_allowed",
            Self::PlayersXpTooLow => "players_xp_too_low",
            Self::PlayersXpTooHigh => "players_xp_too_high",
            Self::PlayerXpInvalid => "player_xp_invalid",
            Self::PasswordWrong => "password_wrong",
            Self::RoomFull => "room_full",
            Self::NotHosting => "not_hosting",
            Self::ChatRateLimit => "chat_rate_limit",
            Self::RateLimitTeams => "rate_limit_teams",
            Self::RateLimitReady => "rate_limit_ready",
            Self::HostChangeRateLimited => "host_change_rate_limited",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// A decoded, typed client packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `13` — the first real packet of a connection.
    JoinRequest {
        user_name: String,
        guest: bool,
        /// Relayed verbatim: a number, a numeric string, or garbage the
        /// admission pipeline will judge.
        level: Value,
        avatar: Value,
        room_password: Option<String>,
    },
    /// `11` — host syncs lobby state to a late joiner.
    InformInLobby { target: PlayerId, settings: Value },
    /// `40` — host syncs in-game state to a late joiner. The full payload
    /// object is forwarded untouched.
    InformInGame { target: PlayerId, data: Value },
    /// `6`
    ChangeOwnTeam { team: u8 },
    /// `10`
    Chat { message: String },
    /// `16`
    SetReady { ready: bool },
    /// `27`
    MapRequest {
        map: Value,
        map_name: String,
        map_author: String,
    },
    /// `35`
    FriendRequest { target: PlayerId },
    /// `44`
    SetTabbed { tabbed: bool },
    /// `7`
    LockTeams { locked: bool },
    /// `9`
    KickBan { target: PlayerId, kick_only: bool },
    /// `20`
    ChangeMode { engine: String, mode: String },
    /// `21`
    ChangeRounds { rounds: i64 },
    /// `23`
    ChangeMap { map: Value },
    /// `26`
    ChangeOtherTeam { target: PlayerId, team: u8 },
    /// `29`
    ChangeBalance { target: PlayerId, balance: i64 },
    /// `32`
    ToggleTeams { on: bool },
    /// `34`
    TransferHost { target: PlayerId },
    /// `36` / `37` — payload relayed verbatim.
    CountdownStart { payload: Value },
    CountdownAbort { payload: Value },
    /// `4` — game-tick input, relayed without validation.
    Inputs { data: Value },
    /// `5`
    StartGame { in_game_state: Value, settings: Value },
    /// `14`
    ReturnToLobby,
    /// `33`
    SaveReplay,
    /// `18` — works even before admission; `id` is echoed back verbatim.
    Timesync { id: Value },
}

impl ClientMessage {
    /// Parses a decoded frame against the inbound table.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        use inbound as op;
        match frame.opcode.as_str() {
            op::JOIN_REQUEST => {
                let args = Args::new(op::JOIN_REQUEST, frame)?;
                Ok(Self::JoinRequest {
                    user_name: args.string("userName")?,
                    guest: args.boolean("guest")?,
                    level: args.any("level"),
                    avatar: args.any("avatar"),
                    room_password: args.optional_string("roomPassword")?,
                })
            }
            op::HOST_INFORM_IN_LOBBY => {
                let args = Args::new(op::HOST_INFORM_IN_LOBBY, frame)?;
                Ok(Self::InformInLobby {
                    target: args.player("sid")?,
                    settings: args.required("gs")?,
                })
            }
            op::HOST_INFORM_IN_GAME => {
                let args = Args::new(op::HOST_INFORM_IN_GAME, frame)?;
                let target = args.player("sid")?;
                Ok(Self::InformInGame {
                    target,
                    data: Value::Object(args.obj.clone()),
                })
            }
            op::CHANGE_OWN_TEAM => {
                let args = Args::new(op::CHANGE_OWN_TEAM, frame)?;
                Ok(Self::ChangeOwnTeam {
                    team: args.team("targetTeam")?,
                })
            }
            op::CHAT_MESSAGE => {
                let args = Args::new(op::CHAT_MESSAGE, frame)?;
                Ok(Self::Chat {
                    message: args.string("message")?,
                })
            }
            op::SET_READY => {
                let args = Args::new(op::SET_READY, frame)?;
                Ok(Self::SetReady {
                    ready: args.boolean("ready")?,
                })
            }
            op::MAP_REQUEST => {
                let args = Args::new(op::MAP_REQUEST, frame)?;
                Ok(Self::MapRequest {
                    map: args.required("m")?,
                    map_name: args.string("mapname")?,
                    map_author: args.string("mapauthor")?,
                })
            }
            op::FRIEND_REQUEST => {
                let args = Args::new(op::FRIEND_REQUEST, frame)?;
                Ok(Self::FriendRequest {
                    target: args.player("id")?,
                })
            }
            op::SET_TABBED => {
                let args = Args::new(op::SET_TABBED, frame)?;
                Ok(Self::SetTabbed {
                    tabbed: args.boolean("tabbed")?,
                })
            }
            op::LOCK_TEAMS => {
                let args = Args::new(op::LOCK_TEAMS, frame)?;
                Ok(Self::LockTeams {
                    locked: args.boolean("teamLock")?,
                })
            }
            op::KICK_BAN_PLAYER => {
                let args = Args::new(op::KICK_BAN_PLAYER, frame)?;
                Ok(Self::KickBan {
                    target: args.player("banshortid")?,
                    kick_only: args.boolean("kickonly")?,
                })
            }
            op::CHANGE_MODE => {
                let args = Args::new(op::CHANGE_MODE, frame)?;
                Ok(Self::ChangeMode {
                    engine: args.string("ga")?,
                    mode: args.string("mo")?,
                })
            }
            op::CHANGE_ROUNDS => {
                let args = Args::new(op::CHANGE_ROUNDS, frame)?;
                Ok(Self::ChangeRounds {
                    rounds: args.integer("w")?,
                })
            }
            op::CHANGE_MAP => {
                let args = Args::new(op::CHANGE_MAP, frame)?;
                Ok(Self::ChangeMap {
                    map: args.required("m")?,
                })
            }
            op::CHANGE_OTHER_TEAM => {
                let args = Args::new(op::CHANGE_OTHER_TEAM, frame)?;
                Ok(Self::ChangeOtherTeam {
                    target: args.player("targetID")?,
                    team: args.team("targetTeam")?,
                })
            }
            op::CHANGE_BALANCE => {
                let args = Args::new(op::CHANGE_BALANCE, frame)?;
                Ok(Self::ChangeBalance {
                    target: args.player("sid")?,
                    balance: args.integer("bal")?,
                })
            }
            op::TOGGLE_TEAMS => {
                let args = Args::new(op::TOGGLE_TEAMS, frame)?;
                Ok(Self::ToggleTeams {
                    on: args.boolean("t")?,
                })
            }
            op::TRANSFER_HOST => {
                let args = Args::new(op::TRANSFER_HOST, frame)?;
                Ok(Self::TransferHost {
                    target: args.player("id")?,
                })
            }
            op::COUNTDOWN_STARTING => Ok(Self::CountdownStart {
                payload: frame.args.first().cloned().unwrap_or(Value::Null),
            }),
            op::COUNTDOWN_ABORTED => Ok(Self::CountdownAbort {
                payload: frame.args.first().cloned().unwrap_or(Value::Null),
            }),
            op::SEND_INPUTS => Ok(Self::Inputs {
                data: frame.args.first().cloned().unwrap_or(Value::Null),
            }),
            op::START_GAME => {
                let args = Args::new(op::START_GAME, frame)?;
                Ok(Self::StartGame {
                    in_game_state: args.any("is"),
                    settings: args.required("gs")?,
                })
            }
            op::RETURN_TO_LOBBY => Ok(Self::ReturnToLobby),
            op::SAVE_REPLAY => Ok(Self::SaveReplay),
            op::TIMESYNC => {
                let args = Args::new(op::TIMESYNC, frame)?;
                Ok(Self::Timesync {
                    id: args.any("id"),
                })
            }
            other => Err(ProtocolError::UnknownOpcode(other.to_string())),
        }
    }

    /// The ratelimit action class gating this opcode, if any.
    ///
    /// This is the single authoritative opcode → action-class table.
    pub fn action_class(&self) -> Option<ActionKey> {
        match self {
            Self::JoinRequest { .. } => Some(ActionKey::Joining),
            Self::Chat { .. } => Some(ActionKey::Chatting),
            Self::ChangeOwnTeam { .. }
            | Self::LockTeams { .. }
            | Self::ChangeOtherTeam { .. } => Some(ActionKey::ChangingTeams),
            Self::SetReady { .. } => Some(ActionKey::Readying),
            Self::TransferHost { .. } => Some(ActionKey::TransferringHost),
            Self::ChangeMode { .. } => Some(ActionKey::ChangingMode),
            Self::ChangeMap { .. } => Some(ActionKey::ChangingMap),
            Self::CountdownStart { .. } | Self::CountdownAbort { .. } => {
                Some(ActionKey::StartGameCountdown)
            }
            Self::StartGame { .. } | Self::ReturnToLobby => {
                Some(ActionKey::StartingEndingGame)
            }
            _ => None,
        }
    }

    /// Whether this opcode is unconditionally host-only.
    ///
    /// `ChangeOwnTeam` is gated only while teams are locked; the
    /// dispatcher handles that case itself.
    pub fn requires_host(&self) -> bool {
        matches!(
            self,
            Self::StartGame { .. }
                | Self::LockTeams { .. }
                | Self::KickBan { .. }
                | Self::InformInLobby { .. }
                | Self::InformInGame { .. }
                | Self::ReturnToLobby
                | Self::ChangeMode { .. }
                | Self::ChangeRounds { .. }
                | Self::ChangeMap { .. }
                | Self::ChangeOtherTeam { .. }
                | Self::ChangeBalance { .. }
                | Self::ToggleTeams { .. }
                | Self::TransferHost { .. }
                | Self::CountdownStart { .. }
                | Self::CountdownAbort { .. }
        )
    }
}

/// Accessor over the single object argument most inbound opcodes carry.
struct Args<'a> {
    opcode: &'static str,
    obj: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    fn new(opcode: &'static str, frame: &'a Frame) -> Result<Self, ProtocolError> {
        let obj = frame
            .args
            .first()
            .and_then(Value::as_object)
            .ok_or(ProtocolError::MissingArgument(opcode, "0"))?;
        Ok(Self { opcode, obj })
    }

    fn required(&self, key: &'static str) -> Result<Value, ProtocolError> {
        self.obj
            .get(key)
            .cloned()
            .ok_or(ProtocolError::MissingArgument(self.opcode, key))
    }

    /// Field relayed verbatim; absent becomes `null`.
    fn any(&self, key: &str) -> Value {
        self.obj.get(key).cloned().unwrap_or(Value::Null)
    }

    fn string(&self, key: &'static str) -> Result<String, ProtocolError> {
        match self.obj.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ProtocolError::WrongArgumentType(self.opcode, key)),
            None => Err(ProtocolError::MissingArgument(self.opcode, key)),
        }
    }

    fn optional_string(&self, key: &'static str) -> Result<Option<String>, ProtocolError> {
        match self.obj.get(key) {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(ProtocolError::WrongArgumentType(self.opcode, key)),
        }
    }

    fn boolean(&self, key: &'static str) -> Result<bool, ProtocolError> {
        match self.obj.get(key) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ProtocolError::WrongArgumentType(self.opcode, key)),
            None => Err(ProtocolError::MissingArgument(self.opcode, key)),
        }
    }

    fn integer(&self, key: &'static str) -> Result<i64, ProtocolError> {
        match self.obj.get(key) {
            Some(v) => v
                .as_i64()
                .ok_or(ProtocolError::WrongArgumentType(self.opcode, key)),
            None => Err(ProtocolError::MissingArgument(self.opcode, key)),
        }
    }

    fn player(&self, key: &'static str) -> Result<PlayerId, ProtocolError> {
        let raw = self.integer(key)?;
        i32::try_from(raw)
            .map(PlayerId)
            .map_err(|_| ProtocolError::WrongArgumentType(self.opcode, key))
    }

    fn team(&self, key: &'static str) -> Result<u8, ProtocolError> {
        let raw = self.integer(key)?;
        match u8::try_from(raw) {
            Ok(t) if t <= team::MAX => Ok(t),
            _ => Err(ProtocolError::WrongArgumentType(self.opcode, key)),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// A typed server packet, rendered to frame text with
/// [`to_frame`](Self::to_frame).
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// `3` — sent to a freshly admitted player.
    ServerInform {
        your_id: PlayerId,
        host_id: PlayerId,
        /// The full slot array: `null` per empty slot, an object per player.
        players: Value,
        game_start_time: u64,
        teams_locked: bool,
    },
    /// `21` — lobby settings, from the host or fabricated by the server
    /// when it auto-assigns a host.
    HostInformInLobby { settings: Value },
    /// `48`
    HostInformInGame { data: Value },
    /// `4`
    PlayerJoined {
        id: PlayerId,
        user_name: String,
        guest: bool,
        level: Value,
        team: u8,
        avatar: Value,
    },
    /// `5`
    PlayerLeft { id: PlayerId, tick_count: u64 },
    /// `6`
    HostLeft {
        old_host: PlayerId,
        new_host: PlayerId,
        tick_count: u64,
    },
    /// `18` — team shape.
    TeamChanged { id: PlayerId, team: u8 },
    /// `18` — balance shape; same opcode, distinguished by keys.
    BalanceChanged { id: PlayerId, balance: i64 },
    /// `20`
    Chat { id: PlayerId, message: String },
    /// `8`
    ReadySet { id: PlayerId, ready: bool },
    /// `33`
    MapRequestHost { map: Value, sender: PlayerId },
    /// `34`
    MapRequestNonHost {
        map_name: String,
        map_author: String,
        sender: PlayerId,
    },
    /// `42`
    FriendRequest { sender: PlayerId },
    /// `52`
    TabbedSet { id: PlayerId, tabbed: bool },
    /// `19`
    TeamsLocked { locked: bool },
    /// `26`
    ModeChanged { engine: String, mode: String },
    /// `27`
    RoundsChanged { rounds: i64 },
    /// `29`
    MapChanged { map: Value },
    /// `39`
    TeamsToggled { on: bool },
    /// `41`
    HostTransferred {
        old_host: PlayerId,
        new_host: PlayerId,
    },
    /// `43` / `44`
    CountdownStarting { payload: Value },
    CountdownAborted { payload: Value },
    /// `7`
    Inputs { sender: PlayerId, data: Value },
    /// `15`
    GameStarted {
        game_start_time: u64,
        in_game_state: Value,
        settings: Value,
    },
    /// `13`
    ReturnedToLobby,
    /// `40`
    ReplaySaved { sender: PlayerId },
    /// `23`
    Timesync { id: Value, result: u64 },
    /// `16`
    Error { code: ErrorCode },
}

impl ServerMessage {
    pub fn opcode(&self) -> &'static str {
        use outbound as op;
        match self {
            Self::ServerInform { .. } => op::SERVER_INFORM,
            Self::HostInformInLobby { .. } => op::HOST_INFORM_IN_LOBBY,
            Self::HostInformInGame { .. } => op::HOST_INFORM_IN_GAME,
            Self::PlayerJoined { .. } => op::PLAYER_JOINED,
            Self::PlayerLeft { .. } => op::PLAYER_LEFT,
            Self::HostLeft { .. } => op::HOST_LEFT,
            Self::TeamChanged { .. } | Self::BalanceChanged { .. } => op::CHANGE_TEAM,
            Self::Chat { .. } => op::CHAT_MESSAGE,
            Self::ReadySet { .. } => op::SET_READY,
            Self::MapRequestHost { .. } => op::MAP_REQUEST_HOST,
            Self::MapRequestNonHost { .. } => op::MAP_REQUEST_NON_HOST,
            Self::FriendRequest { .. } => op::FRIEND_REQUEST,
            Self::TabbedSet { .. } => op::SET_TABBED,
            Self::TeamsLocked { .. } => op::LOCK_TEAMS,
            Self::ModeChanged { .. } => op::CHANGE_MODE,
            Self::RoundsChanged { .. } => op::CHANGE_ROUNDS,
            Self::MapChanged { .. } => op::CHANGE_MAP,
            Self::TeamsToggled { .. } => op::TOGGLE_TEAMS,
            Self::HostTransferred { .. } => op::TRANSFER_HOST,
            Self::CountdownStarting { .. } => op::SEND_COUNTDOWN_STARTING,
            Self::CountdownAborted { .. } => op::SEND_COUNTDOWN_ABORTED,
            Self::Inputs { .. } => op::SEND_INPUTS,
            Self::GameStarted { .. } => op::START_GAME,
            Self::ReturnedToLobby => op::RETURN_TO_LOBBY,
            Self::ReplaySaved { .. } => op::SAVE_REPLAY,
            Self::Timesync { .. } => op::REPLY_TIMESYNC,
            Self::Error { .. } => op::ERROR_MESSAGE,
        }
    }

    /// Renders the packet to wire text.
    pub fn to_frame(&self) -> String {
        let args = match self {
            Self::ServerInform {
                your_id,
                host_id,
                players,
                game_start_time,
                teams_locked,
            } => vec![
                json!(your_id),
                json!(host_id),
                players.clone(),
                json!(game_start_time),
                json!(teams_locked),
                json!(0),
                json!("invalid"),
                Value::Null,
            ],
            Self::HostInformInLobby { settings } => vec![json!({ "gs": settings })],
            Self::HostInformInGame { data } => vec![data.clone()],
            Self::PlayerJoined {
                id,
                user_name,
                guest,
                level,
                team,
                avatar,
            } => vec![
                json!(id),
                json!("invalid"),
                json!(user_name),
                json!(guest),
                level.clone(),
                json!(team),
                avatar.clone(),
            ],
            Self::PlayerLeft { id, tick_count } => {
                vec![json!(id), json!(tick_count)]
            }
            Self::HostLeft {
                old_host,
                new_host,
                tick_count,
            } => vec![json!(old_host), json!(new_host), json!(tick_count)],
            Self::TeamChanged { id, team } => {
                vec![json!({ "targetID": id, "targetTeam": team })]
            }
            Self::BalanceChanged { id, balance } => {
                vec![json!({ "sid": id, "bal": balance })]
            }
            Self::Chat { id, message } => vec![json!(id), json!(message)],
            Self::ReadySet { id, ready } => vec![json!(id), json!(ready)],
            Self::MapRequestHost { map, sender } => {
                vec![map.clone(), json!(sender)]
            }
            Self::MapRequestNonHost {
                map_name,
                map_author,
                sender,
            } => vec![json!(map_name), json!(map_author), json!(sender)],
            Self::FriendRequest { sender } => vec![json!(sender)],
            Self::TabbedSet { id, tabbed } => vec![json!(id), json!(tabbed)],
            Self::TeamsLocked { locked } => vec![json!(locked)],
            Self::ModeChanged { engine, mode } => {
                vec![json!(engine), json!(mode)]
            }
            Self::RoundsChanged { rounds } => vec![json!(rounds)],
            Self::MapChanged { map } => vec![map.clone()],
            Self::TeamsToggled { on } => vec![json!(on)],
            Self::HostTransferred { old_host, new_host } => {
                vec![json!({ "oldHost": old_host, "newHost": new_host })]
            }
            Self::CountdownStarting { payload } => vec![payload.clone()],
            Self::CountdownAborted { payload } => vec![payload.clone()],
            Self::Inputs { sender, data } => vec![json!(sender), data.clone()],
            Self::GameStarted {
                game_start_time,
                in_game_state,
                settings,
            } => vec![
                json!(game_start_time),
                in_game_state.clone(),
                settings.clone(),
            ],
            Self::ReturnedToLobby => vec![],
            Self::ReplaySaved { sender } => vec![json!(sender)],
            Self::Timesync { id, result } => {
                vec![json!({ "id": id, "result": result })]
            }
            Self::Error { code } => vec![json!(code.as_str())],
        };
        codec::encode(self.opcode(), args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    fn parse(op: &str, body: Value) -> Result<ClientMessage, ProtocolError> {
        let text = codec::encode(op, vec![body]);
        ClientMessage::from_frame(&decode(&text).unwrap())
    }

    #[test]
    fn test_join_request_parses() {
        let msg = parse(
            inbound::JOIN_REQUEST,
            json!({
                "userName": "alice",
                "guest": false,
                "level": 5,
                "avatar": {},
                "roomPassword": null
            }),
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRequest {
                user_name: "alice".into(),
                guest: false,
                level: json!(5),
                avatar: json!({}),
                room_password: None,
            }
        );
    }

    #[test]
    fn test_unknown_opcode_is_an_error() {
        let frame = decode(r#"["99",{}]"#).unwrap();
        assert!(matches!(
            ClientMessage::from_frame(&frame),
            Err(ProtocolError::UnknownOpcode(_))
        ));
    }

    #[test]
    fn test_non_boolean_ready_rejected() {
        let err = parse(inbound::SET_READY, json!({ "ready": 1 })).unwrap_err();
        assert!(matches!(err, ProtocolError::WrongArgumentType("16", "ready")));
    }

    #[test]
    fn test_team_out_of_range_rejected() {
        let err = parse(inbound::CHANGE_OWN_TEAM, json!({ "targetTeam": 6 })).unwrap_err();
        assert!(matches!(err, ProtocolError::WrongArgumentType(_, _)));
    }

    #[test]
    fn test_timesync_parses_without_admission_context() {
        let msg = parse(inbound::TIMESYNC, json!({ "id": 7 })).unwrap();
        assert_eq!(msg, ClientMessage::Timesync { id: json!(7) });
    }

    #[test]
    fn test_action_class_table() {
        let chat = parse(inbound::CHAT_MESSAGE, json!({ "message": "x" })).unwrap();
        assert_eq!(chat.action_class(), Some(ActionKey::Chatting));

        let lock = parse(inbound::LOCK_TEAMS, json!({ "teamLock": true })).unwrap();
        assert_eq!(lock.action_class(), Some(ActionKey::ChangingTeams));

        let tabbed = parse(inbound::SET_TABBED, json!({ "tabbed": true })).unwrap();
        assert_eq!(tabbed.action_class(), None);
    }

    #[test]
    fn test_silent_and_errored_classes() {
        assert_eq!(
            ActionKey::Chatting.error_code(),
            Some(ErrorCode::ChatRateLimit)
        );
        assert_eq!(ActionKey::ChangingMap.error_code(), None);
        assert_eq!(ActionKey::StartingEndingGame.error_code(), None);
    }

    #[test]
    fn test_host_gating_table() {
        let transfer = parse(inbound::TRANSFER_HOST, json!({ "id": 1 })).unwrap();
        assert!(transfer.requires_host());

        let own_team = parse(inbound::CHANGE_OWN_TEAM, json!({ "targetTeam": 2 })).unwrap();
        assert!(!own_team.requires_host());

        let chat = parse(inbound::CHAT_MESSAGE, json!({ "message": "x" })).unwrap();
        assert!(!chat.requires_host());
    }

    #[test]
    fn test_player_left_exact_wire_text() {
        let text = ServerMessage::PlayerLeft {
            id: PlayerId(3),
            tick_count: 120,
        }
        .to_frame();
        assert_eq!(text, r#"["5",3,120]"#);
    }

    #[test]
    fn test_team_and_balance_share_opcode_but_differ_in_shape() {
        let team = ServerMessage::TeamChanged {
            id: PlayerId(2),
            team: 3,
        }
        .to_frame();
        let balance = ServerMessage::BalanceChanged {
            id: PlayerId(2),
            balance: -20,
        }
        .to_frame();
        assert_eq!(team, r#"["18",{"targetID":2,"targetTeam":3}]"#);
        assert_eq!(balance, r#"["18",{"bal":-20,"sid":2}]"#);
    }

    #[test]
    fn test_server_inform_tail_is_fixed() {
        let text = ServerMessage::ServerInform {
            your_id: PlayerId(0),
            host_id: PlayerId(0),
            players: json!([{ "userName": "alice" }]),
            game_start_time: 0,
            teams_locked: false,
        }
        .to_frame();
        let frame = decode(&text).unwrap();
        assert_eq!(frame.opcode, "3");
        assert_eq!(frame.args.len(), 8);
        assert_eq!(frame.args[5], json!(0));
        assert_eq!(frame.args[6], json!("invalid"));
        assert_eq!(frame.args[7], Value::Null);
    }

    #[test]
    fn test_outbound_frames_decode_back() {
        // Every outbound packet must survive decode() — element 0 a string
        // opcode, the rest plain JSON.
        let samples = [
            ServerMessage::Chat {
                id: PlayerId(1),
                message: "hello".into(),
            },
            ServerMessage::HostTransferred {
                old_host: PlayerId(0),
                new_host: PlayerId(1),
            },
            ServerMessage::Error {
                code: ErrorCode::RoomFull,
            },
            ServerMessage::Timesync {
                id: json!(42),
                result: 1_700_000_000_000,
            },
            ServerMessage::ReturnedToLobby,
        ];
        for msg in samples {
            let frame = decode(&msg.to_frame()).unwrap();
            assert_eq!(frame.opcode, msg.opcode());
        }
    }
}
