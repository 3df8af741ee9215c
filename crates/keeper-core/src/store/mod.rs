//! Durable key-value persistence for record collections.
//!
//! The store holds one JSON-serialized array per collection key and survives
//! process restarts. Reads and writes are synchronous; the sync engine owns
//! all coordination above this layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Collection key for notes.
pub const NOTES_KEY: &str = "NOTES";
/// Collection key for tags.
pub const TAGS_KEY: &str = "TAGS";

/// Key-value persistence of JSON payloads, one entry per collection key.
pub trait LocalStore: Send + Sync {
    /// Read the raw payload for `key`, or `None` when the key was never set.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the payload for `key`.
    fn write(&self, key: &str, payload: &str) -> Result<()>;
}

/// Load a typed collection from the store. A missing key is an empty
/// collection.
pub fn load_collection<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Result<Vec<T>> {
    match store.read(key)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

/// Persist a typed collection under `key`.
pub fn save_collection<T: Serialize>(
    store: &dyn LocalStore,
    key: &str,
    records: &[T],
) -> Result<()> {
    let raw = serde_json::to_string(records)?;
    store.write(key, &raw)
}

/// File-backed store: one `<key>.json` file per collection under a data
/// directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key.to_lowercase()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LocalStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn write(&self, key: &str, payload: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), payload)?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, payload: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_string(), payload.to_string());
        Ok(())
    }
}
