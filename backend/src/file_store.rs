use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use lottery_shared::{KeyValueStore, StorageError};
use parking_lot::Mutex;

/// Key-value storage kept as a single JSON object on disk.
///
/// Every write rewrites the whole file through a temporary file and a
/// rename, so a crash never leaves a half-written store behind.
pub struct FileStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupted {
                key: path.display().to_string(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == IoErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::Unavailable(e.to_string())),
        };

        tracing::info!("Using store file {} ({} records)", path.display(), items.len());
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn flush(&self, items: &BTreeMap<String, String>) -> std::io::Result<()> {
        let raw = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock();
        let previous = items.insert(key.to_string(), value.to_string());

        if let Err(e) = self.flush(&items) {
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lottery-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_path("reopen");
        {
            let store = FileStore::open(&path).unwrap();
            store.set_item("lotteryCodes", r#"["WIN0001"]"#).unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(
            store.get_item("lotteryCodes").unwrap().as_deref(),
            Some(r#"["WIN0001"]"#)
        );
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_corrupted_file_is_reported() {
        let path = temp_path("corrupt");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StorageError::Corrupted { .. })
        ));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let dir = std::env::temp_dir().join(format!("lottery-missing-{}", uuid::Uuid::new_v4()));
        let store = FileStore::open(dir.join("store.json")).unwrap();
        assert!(store.set_item("usedCodes", "[]").is_err());
        assert_eq!(store.get_item("usedCodes").unwrap(), None);
    }
}
