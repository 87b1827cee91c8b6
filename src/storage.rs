//! Client-local key-value storage
//!
//! The dashboard keeps its portfolio, alerts and session in named slots of a
//! synchronous key-value store. Writers are not coordinated: two processes
//! sharing a storage directory simply overwrite each other, last writer wins.

use crate::error::StorageError;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Synchronous string slot storage
pub trait KeyValueStorage: Send + Sync {
    /// Reads a slot, `None` if it was never written
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites a slot
    fn set(&self, slot: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes a slot; deleting a missing slot is not an error
    fn remove(&self, slot: &str) -> Result<(), StorageError>;
}

/// In-memory storage, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(slot);
        Ok(())
    }
}

/// Directory-backed storage, one `<slot>.json` file per slot
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates if needed) a storage directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir.to_string_lossy(), e))?;
        Ok(Self { dir })
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }

    /// Directory holding the slot files
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.slot_path(slot)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(slot, e)),
        }
    }

    fn set(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        // write-then-rename so a crash never leaves a half-written slot
        let path = self.slot_path(slot);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| StorageError::io(slot, e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(slot, e))
    }

    fn remove(&self, slot: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.slot_path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(slot, e)),
        }
    }
}

/// Reads and decodes a JSON list slot
///
/// A missing slot is an empty list. Unreadable or malformed content is
/// logged and also treated as empty.
pub(crate) fn load_list<T: serde::de::DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    slot: &str,
) -> Vec<T> {
    let raw = match storage.get(slot) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(slot, error = %e, "Failed to read persisted state, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(slot, error = %e, "Malformed persisted state, starting empty");
            Vec::new()
        }
    }
}

/// Encodes a list and overwrites its slot
pub(crate) fn save_list<T: serde::Serialize>(
    storage: &dyn KeyValueStorage,
    slot: &str,
    items: &[T],
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(items).map_err(|e| StorageError::serialize(slot, e))?;
    storage.set(slot, &raw).map_err(|e| {
        tracing::warn!(slot, error = %e, "Failed to persist state");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("a").unwrap(), None);

        storage.set("a", "[1,2]").unwrap();
        storage.set("a", "[3]").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("[3]"));

        storage.remove("a").unwrap();
        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let storage = FileStorage::open(dir.path().join("nested")).unwrap();
        storage.set("slot", r#"{"x":1}"#).unwrap();

        let reopened = FileStorage::open(dir.path().join("nested")).unwrap();
        assert_eq!(reopened.get("slot").unwrap().as_deref(), Some(r#"{"x":1}"#));
        assert_eq!(reopened.get("other").unwrap(), None);

        reopened.remove("slot").unwrap();
        assert_eq!(storage.get("slot").unwrap(), None);
    }

    #[test]
    fn test_load_list_treats_garbage_as_empty() {
        let storage = MemoryStorage::new();
        storage.set("list", "{not json").unwrap();
        let items: Vec<u32> = load_list(&storage, "list");
        assert!(items.is_empty());

        save_list(&storage, "list", &[1u32, 2, 3]).unwrap();
        let items: Vec<u32> = load_list(&storage, "list");
        assert_eq!(items, vec![1, 2, 3]);
    }
}
