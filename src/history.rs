//! Transcription history persistence
//!
//! History is a JSON array in `history.json` next to the config, newest
//! entry first, capped at [`MAX_HISTORY_ENTRIES`]. The orchestrator only
//! emits entries through the [`HistorySink`] trait; this module is the
//! storing collaborator.

use crate::config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Upper bound on stored entries; older ones are dropped.
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// A single transcription result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub language: String,
}

/// Where completed transcriptions go when a preset keeps history.
pub trait HistorySink: Send + Sync {
    fn append(&self, text: &str, language: &str);
}

/// File-backed history store.
pub struct FileHistory {
    path: PathBuf,
    // Serialises the read-modify-write cycle of append/delete
    lock: Mutex<()>,
}

impl FileHistory {
    /// History store in the resolved config directory.
    pub fn new() -> Self {
        Self::at(config::config_dir().join("history.json"))
    }

    /// History store at an explicit path (tests).
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// All entries, newest first. Missing or corrupt files read as empty.
    pub fn load(&self) -> Vec<HistoryEntry> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(_) => return Vec::new(),
        };
        serde_json::from_str(&data).unwrap_or_default()
    }

    fn store(&self, entries: &[HistoryEntry]) {
        let data = match serde_json::to_string_pretty(entries) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("failed to serialize history: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, data) {
            tracing::warn!("failed to write history to {:?}: {}", self.path, e);
        }
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let _guard = self.lock.lock().unwrap();
        self.store(&[]);
    }

    /// Remove the entry with the given timestamp; no-op when absent.
    pub fn delete(&self, timestamp: i64) {
        let _guard = self.lock.lock().unwrap();
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.timestamp != timestamp);
        if entries.len() != before {
            self.store(&entries);
        }
    }
}

impl Default for FileHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistorySink for FileHistory {
    fn append(&self, text: &str, language: &str) {
        let _guard = self.lock.lock().unwrap();
        let mut entries = self.load();
        entries.insert(
            0,
            HistoryEntry {
                text: text.to_string(),
                timestamp: chrono::Utc::now().timestamp_millis(),
                language: language.to_string(),
            },
        );
        entries.truncate(MAX_HISTORY_ENTRIES);
        self.store(&entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileHistory {
        FileHistory::at(dir.path().join("history.json"))
    }

    #[test]
    fn test_empty_when_missing() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load().is_empty());
    }

    #[test]
    fn test_append_newest_first() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);
        history.append("first", "en");
        history.append("second", "ru");

        let entries = history.load();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "second");
        assert_eq!(entries[0].language, "ru");
        assert_eq!(entries[1].text, "first");
    }

    #[test]
    fn test_capped_at_max() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);
        for i in 0..(MAX_HISTORY_ENTRIES + 5) {
            history.append(&format!("entry {}", i), "en");
        }
        assert_eq!(history.load().len(), MAX_HISTORY_ENTRIES);
    }

    #[test]
    fn test_delete_by_timestamp() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);
        history.append("keep", "en");
        let ts = history.load()[0].timestamp;
        history.delete(ts);
        assert!(history.load().is_empty());
        // deleting again is a no-op
        history.delete(ts);
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);
        history.append("a", "en");
        history.clear();
        assert!(history.load().is_empty());
    }
}
