//! Key/value persistence for settings and history.

use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use crate::error::StoreError;

/// A flat JSON key/value area, the moral equivalent of extension storage.
pub trait KeyValueStore: Send + Sync {
    /// Read every stored key.
    fn get_all(&self) -> Result<Map<String, Value>, StoreError>;

    /// Merge `items` into the stored keys.
    fn set(&self, items: Map<String, Value>) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get_all()?.remove(key))
    }
}

/// One JSON object per file. A missing file reads as an empty area. Writes go
/// through a temp file renamed into place, so an interrupted write leaves the
/// previous content intact.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    fn read(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject(self.path.display().to_string())),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_all(&self) -> Result<Map<String, Value>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        self.read()
    }

    fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut current = match self.read() {
            Ok(map) => map,
            Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
            Err(e) => {
                warn!("{} is unreadable and will be replaced: {}", self.path.display(), e);
                Map::new()
            }
        };
        current.extend(items);
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let s = serde_json::to_string_pretty(&Value::Object(current))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, s)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory area used by tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Map<String, Value>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with(items: Value) -> Self {
        let items = match items {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { items: Mutex::new(items) }
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get_all(&self) -> Result<Map<String, Value>, StoreError> {
        Ok(self.items.lock().unwrap().clone())
    }

    fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        self.items.lock().unwrap().extend(items);
        Ok(())
    }
}

/// Store whose every operation fails, for exercising fallback paths.
#[cfg(test)]
pub struct BrokenStore;

#[cfg(test)]
impl KeyValueStore for BrokenStore {
    fn get_all(&self) -> Result<Map<String, Value>, StoreError> {
        Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
    }

    fn set(&self, _items: Map<String, Value>) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
