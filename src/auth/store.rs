// Allow dead code: the in-memory store is exercised from tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Store key for the short-lived access credential
pub const ACCESS_TOKEN_KEY: &str = "access";

/// Store key for the longer-lived refresh credential
pub const REFRESH_TOKEN_KEY: &str = "refresh";

/// Process-wide key-value store for the two credential strings.
///
/// The store is an injected capability rather than ambient global state so
/// the authenticator can be tested against an in-memory implementation.
/// Each key holds an opaque string; writes are single-key overwrites.
pub trait CredentialStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Credential store persisted as a JSON object in the user data directory.
/// The client-side equivalent of browser-local storage: survives restarts.
pub struct FileCredentialStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

/// Credentials file name in the data directory
const CREDENTIALS_FILE: &str = "credentials.json";

impl FileCredentialStore {
    /// Open the store backed by `credentials.json` under `data_dir`.
    /// An unreadable or corrupt file starts empty; the next authorization
    /// check then fails closed into the login flow.
    pub fn open(data_dir: PathBuf) -> Self {
        let path = data_dir.join(CREDENTIALS_FILE);
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt credentials file, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self { path, entries }
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write credentials file: {}", self.path.display()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// In-memory credential store for isolated tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: HashMap<String, String>,
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileCredentialStore::open(dir.path().to_path_buf());

        assert_eq!(store.get(ACCESS_TOKEN_KEY), None);
        store.set(ACCESS_TOKEN_KEY, "tok-a").unwrap();
        store.set(REFRESH_TOKEN_KEY, "tok-r").unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("tok-a"));

        // A reopened store sees the persisted values
        let reopened = FileCredentialStore::open(dir.path().to_path_buf());
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).as_deref(), Some("tok-a"));
        assert_eq!(reopened.get(REFRESH_TOKEN_KEY).as_deref(), Some("tok-r"));
    }

    #[test]
    fn test_file_store_overwrite_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileCredentialStore::open(dir.path().to_path_buf());

        store.set(ACCESS_TOKEN_KEY, "old").unwrap();
        store.set(ACCESS_TOKEN_KEY, "new").unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("new"));

        store.remove(ACCESS_TOKEN_KEY).unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY), None);
        // Removing an absent key is a no-op
        store.remove(ACCESS_TOKEN_KEY).unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE), "not json").unwrap();

        let store = FileCredentialStore::open(dir.path().to_path_buf());
        assert_eq!(store.get(ACCESS_TOKEN_KEY), None);
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryCredentialStore::default();
        store.set(REFRESH_TOKEN_KEY, "r").unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).as_deref(), Some("r"));
        store.remove(REFRESH_TOKEN_KEY).unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY), None);
    }
}
