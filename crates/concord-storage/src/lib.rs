//! # concord-storage
//!
//! why: persist hard state and log entries durably, before the host lets the
//! matching outbox messages leave the machine
//! relations: stores concord-core entries, replays them into Node::from_entries
//! after a restart
//! what: Storage trait, FileStorage, MemStorage, restore_node

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use concord_core::{Entry, Node};

/// Durable storage for a node's replicated state.
///
/// The consensus safety argument requires that the hard state `(term, vote)`
/// and any appended entries reach stable storage before the messages that
/// reference them are transmitted; the host drives that ordering, this trait
/// only supplies the primitives.
pub trait Storage {
    /// persist the current term and vote (0 meaning "not voted")
    fn save_hard_state(&mut self, term: i64, vote: i64) -> io::Result<()>;

    /// load the persisted term and vote, zeroes for a fresh node
    fn load_hard_state(&self) -> io::Result<(i64, i64)>;

    /// append entries to the durable log
    fn append_entries(&mut self, entries: &[Entry]) -> io::Result<()>;

    /// load every persisted entry; the in-memory sentinel is not stored
    fn load_log(&self) -> io::Result<Vec<Entry>>;

    /// drop every entry at or above `index`
    fn truncate_from(&mut self, index: i64) -> io::Result<()>;

    /// remove all persisted state
    fn clear(&mut self) -> io::Result<()>;
}

/// Rebuild a node from persisted entries.
///
/// Storage holds entries from index 1 onward; the `(0, 0)` sentinel is an
/// in-memory anchor and is re-attached here before the log is validated.
pub fn restore_node<S: Storage>(storage: &S, id: i64) -> io::Result<Node> {
    let mut entries = vec![Entry::default()];
    entries.extend(storage.load_log()?);
    Node::from_entries(id, entries).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

// -- file storage --

/// Filesystem-backed storage.
///
/// Keeps two JSON files in a directory: `state.json` for the hard state and
/// `log.json` for the entries. Writes go to a temp file first and are
/// renamed into place, so a crash mid-write never leaves a torn file.
pub struct FileStorage {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize, Default)]
struct HardState {
    term: i64,
    vote: i64,
}

impl FileStorage {
    /// open storage at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened file storage");
        Ok(Self { dir })
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    fn log_path(&self) -> PathBuf {
        self.dir.join("log.json")
    }

    /// write json to a temp file, fsync, then rename over the target
    fn write_atomic(&self, target: PathBuf, json: String) -> io::Result<()> {
        let temp = target.with_extension("tmp");
        let mut file = File::create(&temp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, target)
    }

    fn write_log(&self, log: &[Entry]) -> io::Result<()> {
        let json = serde_json::to_string_pretty(log)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.write_atomic(self.log_path(), json)
    }

    fn read_json<T: Default + for<'de> Deserialize<'de>>(path: PathBuf) -> io::Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        let mut contents = String::new();
        File::open(&path)?.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Storage for FileStorage {
    fn save_hard_state(&mut self, term: i64, vote: i64) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&HardState { term, vote })
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.write_atomic(self.state_path(), json)
    }

    fn load_hard_state(&self) -> io::Result<(i64, i64)> {
        let state: HardState = Self::read_json(self.state_path())?;
        Ok((state.term, state.vote))
    }

    fn append_entries(&mut self, entries: &[Entry]) -> io::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut log = self.load_log()?;
        log.extend(entries.iter().cloned());
        self.write_log(&log)
    }

    fn load_log(&self) -> io::Result<Vec<Entry>> {
        Self::read_json(self.log_path())
    }

    fn truncate_from(&mut self, index: i64) -> io::Result<()> {
        let mut log = self.load_log()?;
        log.retain(|e| e.index < index);
        self.write_log(&log)
    }

    fn clear(&mut self) -> io::Result<()> {
        let _ = fs::remove_file(self.state_path());
        let _ = fs::remove_file(self.log_path());
        Ok(())
    }
}

// -- in-memory storage --

/// In-memory storage for tests and simulated clusters. Nothing survives a
/// drop.
#[derive(Default)]
pub struct MemStorage {
    term: i64,
    vote: i64,
    log: Vec<Entry>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn save_hard_state(&mut self, term: i64, vote: i64) -> io::Result<()> {
        self.term = term;
        self.vote = vote;
        Ok(())
    }

    fn load_hard_state(&self) -> io::Result<(i64, i64)> {
        Ok((self.term, self.vote))
    }

    fn append_entries(&mut self, entries: &[Entry]) -> io::Result<()> {
        self.log.extend(entries.iter().cloned());
        Ok(())
    }

    fn load_log(&self) -> io::Result<Vec<Entry>> {
        Ok(self.log.clone())
    }

    fn truncate_from(&mut self, index: i64) -> io::Result<()> {
        self.log.retain(|e| e.index < index);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.term = 0;
        self.vote = 0;
        self.log.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mem_storage_round_trips_hard_state() {
        let mut storage = MemStorage::new();
        storage.save_hard_state(5, 2).unwrap();
        assert_eq!(storage.load_hard_state().unwrap(), (5, 2));
    }

    #[test]
    fn file_storage_round_trips_hard_state() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();
        storage.save_hard_state(7, 3).unwrap();
        assert_eq!(storage.load_hard_state().unwrap(), (7, 3));
    }

    #[test]
    fn file_storage_defaults_when_empty() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        assert_eq!(storage.load_hard_state().unwrap(), (0, 0));
        assert!(storage.load_log().unwrap().is_empty());
    }

    #[test]
    fn restore_node_reanchors_the_sentinel() {
        let mut storage = MemStorage::new();
        storage
            .append_entries(&[Entry {
                index: 1,
                term: 0,
                peers: Some(vec![1, 2, 3]),
                data: Vec::new(),
            }])
            .unwrap();

        let node = restore_node(&storage, 1).unwrap();
        assert_eq!(node.peer_ids(), vec![2, 3]);
        assert_eq!(node.log().head_mark().index, 1);
    }

    #[test]
    fn restore_node_surfaces_malformed_logs() {
        let mut storage = MemStorage::new();
        // gap: index 1 is missing
        storage.append_entries(&[Entry::new(2, 1, Vec::new())]).unwrap();

        let err = restore_node(&storage, 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
