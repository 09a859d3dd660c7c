//! Session persistence: script and bar-length key spaces plus channel count.
//!
//! The store is read once at startup and written on every successful
//! resynthesis (script + bar length) and on every channel append (count).
//! Persistence has no failure channel back into the core: a store that
//! cannot write logs the problem and the session simply will not survive a
//! restart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Storage interface the scheduler persists through.
pub trait SessionStore {
    fn load_count(&self) -> Option<usize>;
    fn load_script(&self, ordinal: usize) -> Option<String>;
    fn load_bar_length(&self, ordinal: usize) -> Option<f64>;
    /// Called after every successful resynthesis of `ordinal`.
    fn save_channel(&mut self, ordinal: usize, script: &str, bar_length: f64);
    /// Called on every channel append.
    fn save_count(&mut self, count: usize);
}

/// On-disk session layout: two per-ordinal key spaces and the count scalar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub scripts: BTreeMap<usize, String>,
    #[serde(default)]
    pub bar_lengths: BTreeMap<usize, f64>,
}

impl SessionFile {
    /// The first-run session: a kick, a second decay voice, and a sine lead
    /// driven by the other two channels.
    pub fn demo() -> Self {
        let mut session = SessionFile {
            count: Some(3),
            ..Default::default()
        };
        session.scripts.insert(0, "mod(1/4);set(1);exp(12);mul(.8);".to_string());
        session.scripts.insert(1, "mod(1/4);set(1);exp(13);".to_string());
        session
            .scripts
            .insert(2, "mod(1/4);sin((B.L*180)+55,1.29);mul(A.L);".to_string());
        session.bar_lengths.insert(0, 0.25);
        session.bar_lengths.insert(1, 0.25);
        session.bar_lengths.insert(2, 1.0);
        session
    }
}

/// In-memory store, used by tests and as a non-persistent fallback.
#[derive(Debug, Default)]
pub struct MemoryStore {
    session: SessionFile,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_session(session: SessionFile) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionFile {
        &self.session
    }
}

impl SessionStore for MemoryStore {
    fn load_count(&self) -> Option<usize> {
        self.session.count
    }

    fn load_script(&self, ordinal: usize) -> Option<String> {
        self.session.scripts.get(&ordinal).cloned()
    }

    fn load_bar_length(&self, ordinal: usize) -> Option<f64> {
        self.session.bar_lengths.get(&ordinal).copied()
    }

    fn save_channel(&mut self, ordinal: usize, script: &str, bar_length: f64) {
        self.session.scripts.insert(ordinal, script.to_string());
        self.session.bar_lengths.insert(ordinal, bar_length);
    }

    fn save_count(&mut self, count: usize) {
        self.session.count = Some(count);
    }
}

/// JSON-file-backed store. The whole session is rewritten on every save;
/// sessions are a few kilobytes, so there is no incremental path.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    session: SessionFile,
}

impl JsonFileStore {
    /// Load a session file, or start empty when it does not exist.
    pub fn open(path: &Path) -> Result<Self, String> {
        let session = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("invalid session file {}: {}", path.display(), e))?
        } else {
            SessionFile::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            session,
        })
    }

    /// Load a session file, seeding the demo session when it does not exist.
    pub fn open_or_seed(path: &Path) -> Result<Self, String> {
        if path.exists() {
            return Self::open(path);
        }
        let store = Self {
            path: path.to_path_buf(),
            session: SessionFile::demo(),
        };
        store.flush();
        Ok(store)
    }

    fn flush(&self) {
        let json = match serde_json::to_string_pretty(&self.session) {
            Ok(json) => json,
            Err(err) => {
                warn!("failed to serialize session: {}", err);
                return;
            }
        };
        if let Err(err) = std::fs::write(&self.path, json) {
            warn!("failed to write session file {}: {}", self.path.display(), err);
        }
    }
}

impl SessionStore for JsonFileStore {
    fn load_count(&self) -> Option<usize> {
        self.session.count
    }

    fn load_script(&self, ordinal: usize) -> Option<String> {
        self.session.scripts.get(&ordinal).cloned()
    }

    fn load_bar_length(&self, ordinal: usize) -> Option<f64> {
        self.session.bar_lengths.get(&ordinal).copied()
    }

    fn save_channel(&mut self, ordinal: usize, script: &str, bar_length: f64) {
        self.session.scripts.insert(ordinal, script.to_string());
        self.session.bar_lengths.insert(ordinal, bar_length);
        self.flush();
    }

    fn save_count(&mut self, count: usize) {
        self.session.count = Some(count);
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load_count(), None);
        store.save_count(2);
        store.save_channel(1, "set(1)", 0.5);
        assert_eq!(store.load_count(), Some(2));
        assert_eq!(store.load_script(1).as_deref(), Some("set(1)"));
        assert_eq!(store.load_bar_length(1), Some(0.5));
        assert_eq!(store.load_script(0), None);
    }

    #[test]
    fn json_store_seeds_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut store = JsonFileStore::open_or_seed(&path).unwrap();
        assert_eq!(store.load_count(), Some(3));
        store.save_channel(0, "set(.5)", 0.75);
        store.save_count(4);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.load_count(), Some(4));
        assert_eq!(reopened.load_script(0).as_deref(), Some("set(.5)"));
        assert_eq!(reopened.load_bar_length(0), Some(0.75));
        // Untouched keys survive.
        assert_eq!(
            reopened.load_script(1).as_deref(),
            Some("mod(1/4);set(1);exp(13);")
        );
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(&dir.path().join("absent.json")).unwrap();
        assert_eq!(store.load_count(), None);
    }
}
