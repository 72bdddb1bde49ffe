//! Durable client storage for the raw API key.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::ClientError;

/// Storage slot holding the raw API key.
pub const API_KEY_STORAGE_KEY: &str = "admin_api_key";

/// A single persisted API key.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ClientError>;

    fn save(&self, key: &str) -> Result<(), ClientError>;

    /// Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), ClientError>;
}

/// JSON file store that survives restarts.
///
/// The file is a flat string map, shared with other client settings, so only
/// the [`API_KEY_STORAGE_KEY`] entry is touched.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file and rename over the original.
    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.read_map()?.remove(API_KEY_STORAGE_KEY))
    }

    fn save(&self, key: &str) -> Result<(), ClientError> {
        let mut map = self.read_map()?;
        map.insert(API_KEY_STORAGE_KEY.to_string(), key.to_string());
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut map = self.read_map()?;
        if map.remove(API_KEY_STORAGE_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    key: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.key.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.slot().clone())
    }

    fn save(&self, key: &str) -> Result<(), ClientError> {
        *self.slot() = Some(key.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client").join("storage.json");

        let store = FileCredentialStore::new(&path);
        assert_eq!(store.load().unwrap(), None);
        store.save("lk_saved").unwrap();

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.load().unwrap().as_deref(), Some("lk_saved"));

        reopened.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        reopened.clear().unwrap();
    }

    #[test]
    fn file_store_keeps_unrelated_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = FileCredentialStore::new(&path);
        store.save("lk_1").unwrap();
        store.clear().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let map: BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
        assert_eq!(map.get("theme").map(String::as_str), Some("dark"));
        assert!(!map.contains_key(API_KEY_STORAGE_KEY));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            FileCredentialStore::new(&path).load(),
            Err(ClientError::Serialization(_))
        ));
    }
}
