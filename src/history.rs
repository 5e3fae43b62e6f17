//! Bounded history of past exports, persisted through a key-value store.

use crate::cut::Segment;
use crate::error::Result;
use crate::params::{ContentType, Preset};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Key under which the history list is stored.
pub const HISTORY_KEY: &str = "silence_cutter_history";

/// Only the most recent entries are kept.
pub const MAX_ENTRIES: usize = 20;

/// Minimal string store. Values are opaque to the store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // a poisoned map is still a valid map
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/silencecut`, falling back to the working directory.
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("silencecut")
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub file_name: String,
    pub original_duration: f64,
    pub final_duration: f64,
    pub time_removed: f64,
    pub number_of_cuts: usize,
    pub preset: Preset,
    pub content_type: ContentType,
    pub kept_segments: Vec<Segment>,
}

impl HistoryEntry {
    pub fn new(
        file_name: impl Into<String>,
        original_duration: f64,
        final_duration: f64,
        preset: Preset,
        content_type: ContentType,
        kept_segments: Vec<Segment>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            file_name: file_name.into(),
            original_duration,
            final_duration,
            time_removed: original_duration - final_duration,
            number_of_cuts: kept_segments.len().saturating_sub(1),
            preset,
            content_type,
            kept_segments,
        }
    }
}

/// Newest-first list of past exports.
pub struct HistoryStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All entries, newest first. Unreadable data counts as empty history.
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        let Some(raw) = self.store.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("Ignoring unreadable history: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Prepend an entry, dropping the oldest beyond [`MAX_ENTRIES`].
    pub fn save(&self, entry: HistoryEntry) -> Result<HistoryEntry> {
        let mut entries = self.list()?;
        entries.insert(0, entry.clone());
        entries.truncate(MAX_ENTRIES);

        self.write(&entries)?;
        debug!("Saved history entry {} ({} total)", entry.id, entries.len());
        Ok(entry)
    }

    pub fn get(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.list()?.into_iter().find(|e| e.id == id))
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.list()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);

        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.delete(HISTORY_KEY)
    }

    fn write(&self, entries: &[HistoryEntry]) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        self.store.set(HISTORY_KEY, &raw)
    }
}
