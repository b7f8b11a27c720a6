//! The player table: a sparse, fixed-order slot array.
//!
//! Slot ids are array indexes, assigned monotonically and never recycled
//! while the process lives — clients assume id stability, so a released
//! slot stays a hole and the next join appends past it.

use std::net::IpAddr;

use bonkhost_protocol::PlayerId;
use serde_json::{json, Value};

use crate::room::ConnId;

/// One occupied slot.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub user_name: String,
    pub guest: bool,
    /// A number, a numeric string, or the literal `"-"` when levels are
    /// censored. Relayed as-is.
    pub level: Value,
    pub team: u8,
    pub avatar: Value,
    pub ready: bool,
    pub tabbed: bool,
    /// The connection this slot labels.
    pub conn: ConnId,
    /// Observed network address; keys bans and ratelimits.
    pub addr: IpAddr,
}

/// Sparse slot array. Empty and occupied slots are distinct; `count()`
/// only sees occupied ones.
#[derive(Debug, Default)]
pub struct PlayerTable {
    slots: Vec<Option<PlayerSlot>>,
}

impl PlayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a slot and returns its id (always larger than any id
    /// handed out before).
    pub fn allocate(&mut self, slot: PlayerSlot) -> PlayerId {
        let id = PlayerId(self.slots.len() as i32);
        self.slots.push(Some(slot));
        id
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerSlot> {
        usize::try_from(id.0)
            .ok()
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerSlot> {
        usize::try_from(id.0)
            .ok()
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::as_mut)
    }

    /// Empties the slot, leaving a hole. Returns the evicted record.
    pub fn release(&mut self, id: PlayerId) -> Option<PlayerSlot> {
        usize::try_from(id.0)
            .ok()
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::take)
    }

    /// Iterates occupied slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &PlayerSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|slot| (PlayerId(i as i32), slot)))
    }

    /// Exact, case-sensitive name lookup.
    pub fn find_by_name(&self, name: &str) -> Option<PlayerId> {
        self.iter()
            .find(|(_, slot)| slot.user_name == name)
            .map(|(id, _)| id)
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Renders the full slot array for `SERVER_INFORM`: `null` per hole,
    /// an object per player.
    pub fn to_wire(&self) -> Value {
        Value::Array(
            self.slots
                .iter()
                .map(|slot| match slot {
                    Some(p) => json!({
                        "peerId": "invalid",
                        "userName": p.user_name,
                        "guest": p.guest,
                        "level": p.level,
                        "team": p.team,
                        "ready": p.ready,
                        "tabbed": p.tabbed,
                        "avatar": p.avatar,
                    }),
                    None => Value::Null,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str) -> PlayerSlot {
        PlayerSlot {
            user_name: name.to_string(),
            guest: false,
            level: json!(1),
            team: 1,
            avatar: json!({}),
            ready: false,
            tabbed: false,
            conn: ConnId(0),
            addr: "127.0.0.1".parse().unwrap(),
        }
    }

    #[test]
    fn test_ids_are_monotonic_and_never_recycled() {
        let mut table = PlayerTable::new();
        let a = table.allocate(slot("alice"));
        let b = table.allocate(slot("bob"));
        assert_eq!((a, b), (PlayerId(0), PlayerId(1)));

        table.release(a);
        let c = table.allocate(slot("carol"));
        assert_eq!(c, PlayerId(2));
        assert!(table.get(a).is_none());
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_find_by_name_is_exact() {
        let mut table = PlayerTable::new();
        table.allocate(slot("alice"));
        assert_eq!(table.find_by_name("alice"), Some(PlayerId(0)));
        assert_eq!(table.find_by_name("Alice"), None);
        assert_eq!(table.find_by_name("bob"), None);
    }

    #[test]
    fn test_released_slot_is_a_hole_on_the_wire() {
        let mut table = PlayerTable::new();
        table.allocate(slot("alice"));
        let b = table.allocate(slot("bob"));
        table.release(b);

        let wire = table.to_wire();
        let arr = wire.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["userName"], json!("alice"));
        assert_eq!(arr[0]["peerId"], json!("invalid"));
        assert!(arr[1].is_null());
    }

    #[test]
    fn test_negative_id_lookups_are_safe() {
        let table = PlayerTable::new();
        assert!(table.get(PlayerId::NONE).is_none());
    }
}
