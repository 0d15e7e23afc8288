//! Key/value backends for secrets and plain settings.
//!
//! Secrets hold the registry bearer token; settings hold small flags such as
//! whether authentication is disabled. Each call reads or writes a single key.
//!
//! - **`KeyringSecretStore`**: the OS credential store (Keychain, Credential
//!   Manager, kernel keyring). The default.
//! - **`FileSecretStore`**: an owner-only JSON file, for hosts without a
//!   usable keyring.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Keyring access failed for {key}: {source}")]
    Keyring {
        key: String,
        #[source]
        source: keyring::Error,
    },
    #[error("Keyring task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Secure storage for string secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn store(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    /// Where the secrets live, for display.
    fn location(&self) -> String;
}

/// Plain persistent settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError>;
    async fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError>;
}

/// Service name under which keyring entries are filed.
pub const KEYRING_SERVICE: &str = "mcpreg";

/// Secrets kept in the system keyring, one entry per key.
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Run `op` on the entry for `key` off the async thread; keyring
    /// backends block on IPC.
    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&keyring::Entry) -> keyring::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let service = self.service.clone();
        let user = key.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &user)?;
            op(&entry)
        })
        .await?;
        result.map_err(|source| StorageError::Keyring {
            key: key.to_string(),
            source,
        })
    }
}

#[async_trait]
impl SecretStore for KeyringSecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entry(key, |entry| found(entry.get_password())).await
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let value = value.to_string();
        self.with_entry(key, move |entry| entry.set_password(&value)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.with_entry(key, |entry| removed(entry.delete_credential())).await
    }

    fn location(&self) -> String {
        format!("system keyring (service \"{}\")", self.service)
    }
}

/// A missing entry reads as `None`.
fn found(result: keyring::Result<String>) -> keyring::Result<Option<String>> {
    match result {
        Ok(secret) => Ok(Some(secret)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Deleting a missing entry succeeds.
fn removed(result: keyring::Result<()>) -> keyring::Result<()> {
    match result {
        Err(keyring::Error::NoEntry) => Ok(()),
        other => other,
    }
}

/// Secrets kept in a JSON file readable only by its owner.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = read_map(&self.path).await?;
        Ok(map.get(key).and_then(Value::as_str).map(String::from))
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = read_map(&self.path).await?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        write_map(&self.path, &map, true).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut map = read_map(&self.path).await?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        write_map(&self.path, &map, true).await
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Settings kept in a plain JSON file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        let map = read_map(&self.path).await?;
        Ok(map.get(key).and_then(Value::as_bool))
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        let mut map = read_map(&self.path).await?;
        map.insert(key.to_string(), Value::Bool(value));
        write_map(&self.path, &map, false).await
    }
}

/// In-process secret store.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.values).get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.values).remove(key);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// In-process settings store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, bool>>,
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        Ok(lock(&self.values).get(key).copied())
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panic while holding the guard cannot leave a HashMap half-written.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_map(path: &Path) -> Result<Map<String, Value>, StorageError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(&content).map_err(|source| StorageError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_map(path: &Path, map: &Map<String, Value>, private: bool) -> Result<(), StorageError> {
    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let output = serde_json::to_string_pretty(map).map_err(|source| StorageError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    if private {
        owner_only(&mut options);
    }

    let mut file = options.open(path).await.map_err(write_err)?;
    file.write_all(output.as_bytes()).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)
}

#[cfg(unix)]
fn owner_only(options: &mut tokio::fs::OpenOptions) {
    options.mode(0o600);
}

#[cfg(not(unix))]
fn owner_only(_options: &mut tokio::fs::OpenOptions) {}
