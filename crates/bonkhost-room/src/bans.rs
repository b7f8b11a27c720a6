//! The ban list: parallel address/username arrays, persisted as one
//! JSON document on every mutation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::RoomError;

/// The persisted document. Entry `i` of one array corresponds to entry
/// `i` of the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BanList {
    pub addresses: Vec<String>,
    pub usernames: Vec<String>,
}

/// Ban storage bound to its backing file.
#[derive(Debug)]
pub struct BanStore {
    path: PathBuf,
    list: BanList,
}

impl BanStore {
    /// Loads the list from `path`; a missing file is an empty list.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RoomError> {
        let path = path.into();
        let list = match fs::read_to_string(&path) {
            Ok(text) => {
                serde_json::from_str(&text).map_err(|source| RoomError::MalformedDocument {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BanList::default(),
            Err(source) => {
                return Err(RoomError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };
        Ok(Self { path, list })
    }

    pub fn is_banned(&self, address: &str) -> bool {
        self.list.addresses.iter().any(|a| a == address)
    }

    /// Appends an entry and persists.
    pub fn add(&mut self, address: String, username: String) -> Result<(), RoomError> {
        self.list.addresses.push(address);
        self.list.usernames.push(username);
        self.persist()
    }

    /// Removes the entry whose username matches (both arrays, same
    /// index) and persists. Returns whether anything was removed.
    pub fn remove_by_username(&mut self, username: &str) -> Result<bool, RoomError> {
        let Some(index) = self.list.usernames.iter().position(|u| u == username) else {
            return Ok(false);
        };
        self.list.addresses.remove(index);
        self.list.usernames.remove(index);
        self.persist()?;
        Ok(true)
    }

    pub fn list(&self) -> &BanList {
        &self.list
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), RoomError> {
        let text = serde_json::to_string(&self.list).map_err(|source| {
            RoomError::MalformedDocument {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, text).map_err(|source| RoomError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static UNIQUE: AtomicU32 = AtomicU32::new(0);

    fn temp_path() -> PathBuf {
        let n = UNIQUE.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "bonkhost-banlist-{}-{n}.json",
            std::process::id()
        ))
    }

    #[test]
    fn test_missing_file_is_empty_list() {
        let store = BanStore::load(temp_path()).unwrap();
        assert!(!store.is_banned("1.2.3.4"));
        assert!(store.list().addresses.is_empty());
    }

    #[test]
    fn test_add_persists_and_reloads() {
        let path = temp_path();
        {
            let mut store = BanStore::load(&path).unwrap();
            store.add("1.2.3.4".into(), "bob".into()).unwrap();
        }
        let reloaded = BanStore::load(&path).unwrap();
        assert!(reloaded.is_banned("1.2.3.4"));
        assert_eq!(reloaded.list().usernames, vec!["bob"]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unban_restores_pre_ban_state_and_ordering() {
        let path = temp_path();
        let mut store = BanStore::load(&path).unwrap();
        store.add("1.1.1.1".into(), "alice".into()).unwrap();
        let before = store.list().clone();

        store.add("2.2.2.2".into(), "bob".into()).unwrap();
        assert!(store.remove_by_username("bob").unwrap());

        assert_eq!(store.list(), &before);
        assert_eq!(
            store.list().addresses.len(),
            store.list().usernames.len()
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_remove_keeps_arrays_parallel() {
        let path = temp_path();
        let mut store = BanStore::load(&path).unwrap();
        store.add("1.1.1.1".into(), "alice".into()).unwrap();
        store.add("2.2.2.2".into(), "bob".into()).unwrap();
        store.add("3.3.3.3".into(), "carol".into()).unwrap();

        store.remove_by_username("bob").unwrap();
        assert_eq!(store.list().addresses, vec!["1.1.1.1", "3.3.3.3"]);
        assert_eq!(store.list().usernames, vec!["alice", "carol"]);
        assert!(!store.remove_by_username("bob").unwrap());
        let _ = fs::remove_file(&path);
    }
}
