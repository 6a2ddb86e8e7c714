//! Durable key-value storage for gate flags

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Key under which the lock flag is persisted
pub const LOCKED_KEY: &str = "locked";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Could not find data directory")]
    NoDataDir,
}

/// Boolean key-value storage that survives process restarts
pub trait KeyValueStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError>;

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError>;
}

/// JSON-file backed store
///
/// The whole object is rewritten on every `set_bool`. Writes go to a sibling
/// temp file first and are renamed into place so a crash never leaves a
/// half-written store behind.
pub struct FileStore {
    path: PathBuf,
    cache: RwLock<Option<Map<String, Value>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    /// Store at `<data dir>/exam-gate/store.json`
    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf, StoreError> {
        let data_dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(data_dir.join("exam-gate").join("store.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> Result<Map<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str::<Map<String, Value>>(&contents)?)
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        if let Some(map) = self.cache.read().as_ref() {
            return Ok(map.get(key).and_then(Value::as_bool));
        }

        let mut cache = self.cache.write();
        if cache.is_none() {
            *cache = Some(self.load_map()?);
        }
        Ok(cache
            .as_ref()
            .and_then(|map| map.get(key))
            .and_then(Value::as_bool))
    }

    /// Read-modify-write under one write lock. A corrupt file is replaced
    /// rather than blocking every later write.
    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let mut cache = self.cache.write();
        let mut map = match cache.as_ref() {
            Some(map) => map.clone(),
            None => match self.load_map() {
                Ok(map) => map,
                Err(StoreError::Serde(e)) => {
                    tracing::warn!(
                        "Discarding unreadable store {}: {}",
                        self.path.display(),
                        e
                    );
                    Map::new()
                }
                Err(e) => return Err(e),
            },
        };

        map.insert(key.to_string(), Value::Bool(value));
        self.write_map(&map)?;
        *cache = Some(map);

        tracing::debug!("Persisted {}={} to {}", key, value, self.path.display());
        Ok(())
    }
}

/// In-process store, lost on exit
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bool(key: &str, value: bool) -> Self {
        let store = Self::new();
        store.values.write().insert(key.to_string(), value);
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.values.read().get(key).copied())
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}
