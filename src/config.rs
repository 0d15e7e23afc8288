//! Client settings (get/set), stored as TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::client::DEFAULT_LIMIT;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

/// Overrides `api_base_url` from the config file.
pub const API_BASE_ENV: &str = "MCPREG_API_BASE";

/// Where the bearer token is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// OS credential store.
    #[default]
    Keyring,
    /// Owner-only file in the state directory.
    File,
}

impl std::fmt::Display for TokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyring => write!(f, "keyring"),
            Self::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    /// Re-list the registry after commands that change it.
    pub auto_refresh: bool,
    pub page_size: u32,
    pub token_storage: TokenStorage,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auto_refresh: true,
            page_size: DEFAULT_LIMIT,
            token_storage: TokenStorage::default(),
        }
    }
}

impl Settings {
    /// Load from `path` (defaults when the file does not exist), then apply
    /// the environment override.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = Self::load_file(path)?;
        if let Ok(url) = std::env::var(API_BASE_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                settings.api_base_url = url.to_string();
            }
        }
        Ok(settings)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
            return Err(ConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
        };
        let mut settings: Self = toml::from_str(&content).map_err(ConfigError::ParseFailed)?;
        if settings.page_size == 0 {
            warn!("page_size = 0 in {}, using {}", path.display(), DEFAULT_LIMIT);
            settings.page_size = DEFAULT_LIMIT;
        }
        Ok(settings)
    }
}

/// Set one setting in the config file, keeping any other keys it holds.
pub fn set_config_value(path: &Path, key: &str, value: &str) -> Result<(), ConfigError> {
    let mut table: toml::Table = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).map_err(ConfigError::ParseFailed)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
        Err(source) => {
            return Err(ConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let value = parse_value(key, value.trim())?;
    table.insert(key.to_string(), value);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let output = toml::to_string_pretty(&table).map_err(ConfigError::SerializeFailed)?;
    std::fs::write(path, output).map_err(|source| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

fn parse_value(key: &str, value: &str) -> Result<toml::Value, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    match key {
        "api_base_url" => {
            let url = url::Url::parse(value).map_err(|e| invalid(&e.to_string()))?;
            if url.cannot_be_a_base() {
                return Err(invalid("not an http(s) URL"));
            }
            Ok(toml::Value::String(value.to_string()))
        }
        "auto_refresh" => value
            .parse::<bool>()
            .map(toml::Value::Boolean)
            .map_err(|_| invalid("expected true or false")),
        "page_size" => match value.parse::<u32>() {
            Ok(n) if n > 0 => Ok(toml::Value::Integer(i64::from(n))),
            _ => Err(invalid("expected a positive integer")),
        },
        "token_storage" => match value {
            "keyring" | "file" => Ok(toml::Value::String(value.to_string())),
            _ => Err(invalid("expected keyring or file")),
        },
        _ => Err(ConfigError::UnknownKey(key.to_string())),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown config key '{0}' (expected one of: api_base_url, auto_refresh, page_size, token_storage)")]
    UnknownKey(String),
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Failed to read {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[source] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[source] toml::ser::Error),
    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_file(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.page_size, 50);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "auto_refresh = false\n").unwrap();

        let settings = Settings::load_file(&path).unwrap();
        assert!(!settings.auto_refresh);
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn zero_page_size_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "page_size = 0\n").unwrap();

        let settings = Settings::load_file(&path).unwrap();
        assert_eq!(settings.page_size, DEFAULT_LIMIT);
    }

    #[test]
    fn unreadable_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();

        let err = Settings::load_file(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
        assert!(err.to_string().contains(&dir.path().display().to_string()));
    }

    #[test]
    fn set_value_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        set_config_value(&path, "page_size", "20").unwrap();
        set_config_value(&path, "api_base_url", "https://registry.example.com").unwrap();

        let settings = Settings::load_file(&path).unwrap();
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.api_base_url, "https://registry.example.com");
        assert!(settings.auto_refresh);
        assert_eq!(settings.token_storage, TokenStorage::Keyring);

        set_config_value(&path, "token_storage", "file").unwrap();
        assert_eq!(Settings::load_file(&path).unwrap().token_storage, TokenStorage::File);
    }

    #[test]
    fn set_value_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(matches!(
            set_config_value(&path, "colour", "red"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            set_config_value(&path, "page_size", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            set_config_value(&path, "auto_refresh", "yes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            set_config_value(&path, "token_storage", "plaintext"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            set_config_value(&path, "api_base_url", "localhost"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn env_overrides_base_url() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var(API_BASE_ENV, "http://10.0.0.5:8080");
        let settings = Settings::load(&dir.path().join("config.toml"));
        std::env::remove_var(API_BASE_ENV);

        assert_eq!(settings.unwrap().api_base_url, "http://10.0.0.5:8080");
    }
}
