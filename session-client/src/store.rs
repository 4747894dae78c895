// session-client/src/store.rs
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::UserData;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::session::Session;

pub const TOKEN_KEY: &str = "farcaster_auth_token";
pub const USER_DATA_KEY: &str = "farcaster_auth_user_data";

/// Session-scoped key/value slot
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a session directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Mirrors `{token, user_data}` into storage. Failures are logged and swallowed.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Restore the persisted session, or the empty one when anything is off
    pub fn load(&self) -> Session {
        let restored = self
            .read::<String>(TOKEN_KEY)
            .and_then(|token| Ok((token, self.read::<UserData>(USER_DATA_KEY)?)));

        match restored {
            Ok((Some(_), None)) => {
                tracing::warn!("Discarding stored token without user data");
                Session::default()
            },
            Ok((token, user_data)) => Session {
                token,
                user_data,
                is_loading: false,
            },
            Err(e) => {
                tracing::warn!("Failed to restore session: {}", e);
                Session::default()
            },
        }
    }

    /// Write both slots independently; `None` clears a slot
    pub fn save(&self, token: Option<&str>, user_data: Option<&UserData>) {
        if let Err(e) = self.write(TOKEN_KEY, token) {
            tracing::warn!("Failed to persist session token: {}", e);
        }
        if let Err(e) = self.write(USER_DATA_KEY, user_data) {
            tracing::warn!("Failed to persist session user data: {}", e);
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.storage.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: Option<&T>) -> Result<(), StorageError> {
        match value {
            Some(value) => self.storage.set(key, &serde_json::to_string(value)?),
            None => self.storage.remove(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::new(ErrorKind::PermissionDenied, "denied").into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(ErrorKind::PermissionDenied, "denied").into())
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(ErrorKind::PermissionDenied, "denied").into())
        }
    }

    fn user() -> UserData {
        UserData {
            fid: Some(7),
            address: Some("0xABC".to_string()),
        }
    }

    #[test]
    fn test_round_trip() {
        let store = SessionStore::in_memory();
        store.save(Some("abc"), Some(&user()));

        let session = store.load();
        assert_eq!(session, Session::authenticated("abc".to_string(), user()));
    }

    #[test]
    fn test_clearing_yields_empty_session() {
        let store = SessionStore::in_memory();
        store.save(Some("abc"), Some(&user()));
        store.save(None, None);

        assert_eq!(store.load(), Session::default());
    }

    #[test]
    fn test_values_are_json_encoded() {
        let storage = Arc::new(MemoryStorage::new());
        SessionStore::new(storage.clone()).save(Some("abc"), Some(&user()));

        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("\"abc\""));
        assert_eq!(
            storage.get(USER_DATA_KEY).unwrap().as_deref(),
            Some(r#"{"fid":7,"address":"0xABC"}"#)
        );
    }

    #[test]
    fn test_corrupt_entry_yields_empty_session() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "\"abc\"").unwrap();
        storage.set(USER_DATA_KEY, "{not json").unwrap();

        assert_eq!(SessionStore::new(storage).load(), Session::default());
    }

    #[test]
    fn test_bare_token_is_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "\"abc\"").unwrap();

        assert_eq!(SessionStore::new(storage).load(), Session::default());
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        let store = SessionStore::new(Arc::new(BrokenStorage));
        store.save(Some("abc"), Some(&user()));
        assert_eq!(store.load(), Session::default());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = std::env::temp_dir().join(format!("session-client-store-{}", std::process::id()));
        let store = SessionStore::new(Arc::new(FileStorage::new(&dir).unwrap()));

        store.save(Some("abc"), Some(&user()));
        assert_eq!(store.load().token.as_deref(), Some("abc"));

        store.save(None, None);
        assert_eq!(store.load(), Session::default());
        // Removing an already missing key is fine
        store.save(None, None);

        let _ = fs::remove_dir_all(dir);
    }
}
