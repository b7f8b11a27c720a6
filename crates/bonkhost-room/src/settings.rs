//! Game settings: the host-controlled record every client must agree on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The room's game settings.
///
/// Mutable only by the host through designated opcodes, overwritten
/// wholesale on game start, and relayed to late joiners. The named
/// fields are the ones the server reads; everything else a client sends
/// rides along in `extra` and survives round trips verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Encoded map, opaque to the server.
    pub map: Value,
    /// Game type.
    pub gt: i64,
    /// Rounds to win.
    pub wl: i64,
    /// Quickplay.
    pub q: bool,
    /// Teams locked: only the host may change any team.
    pub tl: bool,
    /// Teams on.
    pub tea: bool,
    /// Engine tag, `"b"` or `"f"`.
    pub ga: String,
    /// Mode tag (`"b"`, `"bs"`, `"ar"`, …).
    pub mo: String,
    /// Balance percentage per player id; absent entry = 0.
    pub bal: HashMap<i32, i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            map: Value::String(String::new()),
            gt: 2,
            wl: 3,
            q: false,
            tl: false,
            tea: false,
            ga: "b".to_string(),
            mo: "b".to_string(),
            bal: HashMap::new(),
            extra: Map::new(),
        }
    }
}

impl GameSettings {
    /// Parses a settings blob sent by a client (e.g. in a game start).
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Renders the settings for the wire.
    pub fn to_value(&self) -> Value {
        // Serialization of this shape cannot fail: keys are strings and
        // every value is plain JSON.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
