//! Fallback store: a flat string-keyed JSON file with a byte quota.
//!
//! Used when the primary store cannot be opened, and always as the home of
//! the lightweight expense mirror. Keys are scoped `"{collection}:{key}"`.

use crate::error::{ClientError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default capacity, in the same ballpark as a browser's local storage.
pub const DEFAULT_CAPACITY: usize = 5 * 1024 * 1024;

/// Persistent string-keyed store with a capacity limit.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    capacity: usize,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store, loading any existing file. A corrupt file is
    /// discarded and the store starts empty.
    pub fn open(path: &Path, capacity: usize) -> Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };
        Ok(Self {
            path: path.to_path_buf(),
            capacity,
            entries: Mutex::new(entries),
        })
    }

    /// Get a stored value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("fallback store lock poisoned")
            .get(key)
            .cloned()
    }

    /// Store a value, rejecting the write with [`ClientError::Quota`] when
    /// it would push the store past its capacity. A rejected write leaves
    /// the previous value in place.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("fallback store lock poisoned");

        let current: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        if current + key.len() + value.len() > self.capacity {
            return Err(ClientError::Quota);
        }

        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    /// Remove a key. Missing keys are not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("fallback store lock poisoned");
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    // Write-to-temp then rename so a crash mid-write never corrupts the file.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.json");

        {
            let store = FileStore::open(&path, DEFAULT_CAPACITY).unwrap();
            store.set("notes:text", "\"hello\"").unwrap();
            assert_eq!(store.get("notes:text").as_deref(), Some("\"hello\""));
        }

        let store = FileStore::open(&path, DEFAULT_CAPACITY).unwrap();
        assert_eq!(store.get("notes:text").as_deref(), Some("\"hello\""));
    }

    #[test]
    fn quota_rejects_oversized_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("fallback.json"), 32).unwrap();

        store.set("a", "short").unwrap();
        let result = store.set("b", &"x".repeat(64));
        assert!(matches!(result, Err(ClientError::Quota)));

        // previous contents untouched
        assert_eq!(store.get("a").as_deref(), Some("short"));
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn quota_counts_replaced_value_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("fallback.json"), 24).unwrap();

        store.set("k", &"a".repeat(20)).unwrap();
        // replacing the same key with a same-sized value still fits
        store.set("k", &"b".repeat(20)).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("b".repeat(20).as_str()));
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("fallback.json"), 64).unwrap();
        store.remove("ghost").unwrap();
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path, DEFAULT_CAPACITY).unwrap();
        assert_eq!(store.get("anything"), None);
    }
}
