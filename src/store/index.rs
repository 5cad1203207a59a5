//! The JSON metadata cache (`index.json`).
//!
//! One mutable mapping from track id to track record, exclusively owned
//! by the mutating process. Loaded once at startup; persisted wholesale
//! after each successful processor run. The on-disk JSON is a
//! crash-recovery snapshot, not a transaction log.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::track::{Track, TrackId};

#[derive(Debug)]
pub struct Cache {
    path: PathBuf,
    entries: HashMap<TrackId, Track>,
}

impl Cache {
    /// An empty cache that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Cache {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    /// Load the cache from its JSON snapshot.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = fs::read_to_string(&path)?;
        let entries: HashMap<TrackId, Track> = serde_json::from_str(&raw)?;

        for (id, track) in &entries {
            if *id != track.id {
                return Err(Error::Validation(format!(
                    "index.json key {id} does not match entry id {}",
                    track.id
                )));
            }
        }

        Ok(Cache { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.entries.get(id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.entries.values()
    }

    pub fn insert(&mut self, track: Track) -> Option<Track> {
        self.entries.insert(track.id, track)
    }

    pub fn remove(&mut self, id: &TrackId) -> Option<Track> {
        self.entries.remove(id)
    }

    /// Swap in a fully recomputed entry set (fsck repair).
    pub fn replace_all(&mut self, entries: HashMap<TrackId, Track>) {
        self.entries = entries;
    }

    /// A by-value copy of the entries, for lock-free inspection.
    pub fn snapshot(&self) -> HashMap<TrackId, Track> {
        self.entries.clone()
    }

    /// Persist the whole cache to disk, atomically replacing the previous
    /// snapshot. Keys are sorted so snapshots diff cleanly.
    pub fn persist(&self) -> Result<()> {
        let ordered: BTreeMap<String, &Track> = self
            .entries
            .iter()
            .map(|(id, track)| (id.to_string(), track))
            .collect();
        let json = serde_json::to_string_pretty(&ordered)?;
        super::replace_file(&self.path, json.as_bytes())?;
        Ok(())
    }
}
