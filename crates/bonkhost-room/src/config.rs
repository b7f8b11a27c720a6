//! Server configuration, loaded once at startup.
//!
//! The document is JSON with `camelCase` keys and per-field defaults, so
//! a partial file (or none at all) yields a runnable server.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{GameSettings, RoomError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub port: u16,
    /// Serve WSS instead of WS. Requires `tlsCert` and `tlsKey`.
    pub use_https: bool,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub room_name_on_startup: String,
    pub room_password_on_startup: Option<String>,
    pub default_game_settings: GameSettings,
    pub max_players: usize,
    /// Give the first player (and the next one, when the host leaves)
    /// the host seat automatically.
    pub auto_assign_host: bool,
    /// A `time` crate format description used for chat-log lines.
    pub time_stamp_format: String,
    pub ban_list_path: PathBuf,
    pub chat_log_dir: PathBuf,
    pub restrictions: Restrictions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            use_https: false,
            tls_cert: None,
            tls_key: None,
            room_name_on_startup: "bonkhost room".to_string(),
            room_password_on_startup: None,
            default_game_settings: GameSettings::default(),
            max_players: 8,
            auto_assign_host: true,
            time_stamp_format: "[year]-[month]-[day] [hour]:[minute]:[second]".to_string(),
            ban_list_path: PathBuf::from("banlist.json"),
            chat_log_dir: PathBuf::from("chatlogs"),
            restrictions: Restrictions::default(),
        }
    }
}

impl ServerConfig {
    /// Reads and parses the config file. A missing file yields the
    /// defaults; a present-but-malformed file is a startup error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RoomError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| {
                RoomError::MalformedDocument {
                    path: path.to_path_buf(),
                    source,
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(RoomError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Compiles `disallowRegex`, if configured. An invalid pattern is a
    /// startup error.
    pub fn compile_username_regex(&self) -> Result<Option<Regex>, RoomError> {
        self.restrictions
            .usernames
            .disallow_regex
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| RoomError::InvalidConfig(format!("disallowRegex: {e}")))
            })
            .transpose()
    }

    /// Startup check for TLS material: `useHttps` without readable
    /// certificate and key files is fatal.
    pub fn check_tls_material(&self) -> Result<(), RoomError> {
        if !self.use_https {
            return Ok(());
        }
        for (key, path) in [("tlsCert", &self.tls_cert), ("tlsKey", &self.tls_key)] {
            match path {
                Some(p) if p.is_file() => {}
                Some(p) => {
                    return Err(RoomError::InvalidConfig(format!(
                        "{key}: {} is not a readable file",
                        p.display()
                    )))
                }
                None => {
                    return Err(RoomError::InvalidConfig(format!(
                        "useHttps is set but {key} is missing"
                    )))
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Restrictions {
    pub usernames: UsernameRules,
    pub levels: LevelRules,
    pub max_chat_message_length: usize,
    pub ratelimits: Ratelimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsernameRules {
    pub no_duplicates: bool,
    pub no_empty_names: bool,
    pub max_length: usize,
    pub disallow_regex: Option<String>,
}

impl Default for UsernameRules {
    fn default() -> Self {
        Self {
            no_duplicates: true,
            no_empty_names: true,
            max_length: 32,
            disallow_regex: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelRules {
    pub min_level: i64,
    pub max_level: i64,
    /// Reject levels whose textual form contains non-digits.
    pub only_allow_numbers: bool,
    /// Store and relay `"-"` instead of the reported level.
    pub censor_levels: bool,
}

impl Default for LevelRules {
    fn default() -> Self {
        Self {
            min_level: 0,
            max_level: 999,
            only_allow_numbers: false,
            censor_levels: false,
        }
    }
}

/// One token bucket's shape. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatelimitRule {
    pub amount: u32,
    pub timeframe: u64,
    pub restore: u64,
}

impl RatelimitRule {
    const fn new(amount: u32, timeframe: u64, restore: u64) -> Self {
        Self {
            amount,
            timeframe,
            restore,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ratelimits {
    pub joining: RatelimitRule,
    pub chatting: RatelimitRule,
    pub changing_teams: RatelimitRule,
    pub readying: RatelimitRule,
    pub transferring_host: RatelimitRule,
    pub changing_mode: RatelimitRule,
    pub changing_map: RatelimitRule,
    pub start_game_countdown: RatelimitRule,
    pub starting_ending_game: RatelimitRule,
}

impl Default for Ratelimits {
    fn default() -> Self {
        Self {
            joining: RatelimitRule::new(5, 10, 60),
            chatting: RatelimitRule::new(7, 10, 10),
            changing_teams: RatelimitRule::new(10, 5, 10),
            readying: RatelimitRule::new(20, 10, 10),
            transferring_host: RatelimitRule::new(3, 10, 30),
            changing_mode: RatelimitRule::new(10, 5, 10),
            changing_map: RatelimitRule::new(10, 5, 10),
            start_game_countdown: RatelimitRule::new(5, 5, 10),
            starting_ending_game: RatelimitRule::new(5, 10, 10),
        }
    }
}

impl Ratelimits {
    /// The rule for an action class.
    pub fn rule(&self, action: bonkhost_protocol::ActionKey) -> &RatelimitRule {
        use bonkhost_protocol::ActionKey::*;
        match action {
            Joining => &self.joining,
            Chatting => &self.chatting,
            ChangingTeams => &self.changing_teams,
            Readying => &self.readying,
            TransferringHost => &self.transferring_host,
            ChangingMode => &self.changing_mode,
            ChangingMap => &self.changing_map,
            StartGameCountdown => &self.start_game_countdown,
            StartingEndingGame => &self.starting_ending_game,
        }
    }
}
