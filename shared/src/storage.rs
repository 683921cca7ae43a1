use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// String key-value storage in the shape of the browser's `localStorage`.
///
/// Writes take `&self`: implementations share their backing store between
/// clones, the same way two tabs share one origin's storage.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }
}

/// Reads a JSON record, treating a missing key as the default value.
pub fn load_json<T, S>(store: &S, key: &str) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    match store.get_item(key)? {
        Some(raw) if !raw.trim().is_empty() && raw.trim() != "null" => {
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupted {
                key: key.to_string(),
                reason: e.to_string(),
            })
        }
        _ => Ok(T::default()),
    }
}

pub fn save_json<T, S>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Write {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.set_item(key, &raw)
}

#[derive(Debug, Default)]
struct MemoryInner {
    items: HashMap<String, String>,
    fail_writes: bool,
}

/// In-process storage. Clones share the same items.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, simulating a full or broken store.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.lock().items.clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.lock().items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        inner.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_loads_default() {
        let store = MemoryStore::new();
        let codes: Vec<String> = load_json(&store, "lotteryCodes").unwrap();
        assert!(codes.is_empty());
    }

    #[test]
    fn test_clones_share_items() {
        let store = MemoryStore::new();
        let other = store.clone();
        save_json(&store, "usedCodes", &vec!["A"]).unwrap();
        let used: Vec<String> = load_json(&other, "usedCodes").unwrap();
        assert_eq!(used, vec!["A".to_string()]);
    }

    #[test]
    fn test_corrupted_record() {
        let store = MemoryStore::new();
        store.set_item("ipRecords", "{not json").unwrap();
        let err = load_json::<HashMap<String, u32>, _>(&store, "ipRecords").unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }

    #[test]
    fn test_failing_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.set_item("k", "v").is_err());
        assert_eq!(store.get_item("k").unwrap(), None);
    }
}
