//! User-facing operations: each one reads the session, calls the registry,
//! and refreshes the tree where the listing changed.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::client::{ListQuery, RegistryClient};
use crate::config::{ConfigError, Settings, TokenStorage};
use crate::error::RegistryError;
use crate::models::{RegistryEntry, ServerConfig};
use crate::namespace::Namespace;
use crate::paths::Paths;
use crate::session::{mask_token, SessionStore};
use crate::storage::{
    FileSecretStore, FileSettingsStore, KeyringSecretStore, SecretStore, StorageError, KEYRING_SERVICE,
};
use crate::tree::TreeProjector;
use crate::workspace::WorkspaceError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("Cannot connect to MCP Registry API at {0}. Please ensure it is running at the configured URL.")]
    ApiUnreachable(String),
    #[error("No update data provided. Use --file or specify fields to update.")]
    EmptyUpdate,
}

impl CommandError {
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, CommandError::Registry(RegistryError::NotAuthenticated))
    }
}

/// Where a stored token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Provided,
    DevEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub auth_disabled: bool,
    pub authenticated: bool,
    pub token_preview: Option<String>,
}

/// Field overrides for an update, applied on top of an optional file.
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub endpoint: Option<String>,
}

impl UpdateFields {
    pub fn apply(self, mut base: Map<String, Value>) -> Map<String, Value> {
        let overrides = [
            ("name", self.name),
            ("description", self.description),
            ("version", self.version),
            ("endpoint", self.endpoint),
        ];
        for (key, value) in overrides {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                base.insert(key.to_string(), Value::String(v));
            }
        }
        base
    }
}

/// A registry connection with its session and displayed tree.
pub struct Registry {
    client: RegistryClient,
    session: SessionStore,
    tree: TreeProjector,
    settings: Settings,
}

impl Registry {
    pub fn new(settings: Settings, session: SessionStore) -> Result<Self, CommandError> {
        let client = RegistryClient::new(&settings.api_base_url)?;
        Ok(Self {
            client,
            session,
            tree: TreeProjector::new(),
            settings,
        })
    }

    /// Settings from the config file. The token goes to the store named by
    /// `token_storage`; the auth-disabled flag lives in the state directory.
    pub fn open(paths: &Paths) -> Result<Self, CommandError> {
        let settings = Settings::load(paths.config_file())?;
        let session = SessionStore::new(
            secret_store(settings.token_storage, paths),
            Arc::new(FileSettingsStore::new(paths.settings_file())),
        );
        Self::new(settings, session)
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn tree(&self) -> &TreeProjector {
        &self.tree
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Re-list the registry and rebuild the tree. Returns the registry's
    /// total match count. On failure the tree is emptied.
    pub async fn refresh(&mut self, text: Option<&str>, tools: &[String]) -> Result<u64, CommandError> {
        let query = ListQuery {
            text,
            tools,
            limit: self.settings.page_size,
        };
        let listed = match self.session.effective_token().await {
            Ok(token) => self
                .client
                .list_entries(&query, token.as_deref())
                .await
                .map_err(CommandError::from),
            Err(e) => Err(e.into()),
        };

        match listed {
            Ok(list) => {
                let total = list.total;
                self.tree.rebuild(list.servers);
                Ok(total)
            }
            Err(e) => {
                self.tree.clear();
                Err(e)
            }
        }
    }

    /// Whether a failure should suggest logging in. Only affects wording.
    pub async fn suggests_login(&self) -> bool {
        !self.session.is_auth_disabled().await.unwrap_or(false)
    }

    /// Store `token` if given, otherwise fetch one from the registry's
    /// development endpoint.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<TokenSource, CommandError> {
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            self.session.store_token(token).await?;
            return Ok(TokenSource::Provided);
        }

        if !self.client.check_health().await {
            return Err(CommandError::ApiUnreachable(self.client.base_url().to_string()));
        }
        let token = self.client.get_dev_token().await?;
        self.session.store_token(&token).await?;
        info!("authenticated with development token");
        Ok(TokenSource::DevEndpoint)
    }

    pub async fn logout(&self) -> Result<(), CommandError> {
        Ok(self.session.clear_token().await?)
    }

    pub async fn disable_auth(&self) -> Result<(), CommandError> {
        Ok(self.session.set_auth_disabled(true).await?)
    }

    pub async fn enable_auth(&self) -> Result<(), CommandError> {
        Ok(self.session.set_auth_disabled(false).await?)
    }

    pub async fn status(&self) -> Result<SessionStatus, CommandError> {
        let auth_disabled = self.session.is_auth_disabled().await?;
        let authenticated = self.session.is_authenticated().await?;
        let token_preview = self.session.stored_token().await?.map(|t| mask_token(&t));
        Ok(SessionStatus {
            auth_disabled,
            authenticated,
            token_preview,
        })
    }

    /// Token for a mutating call. Fails before any request is made.
    pub async fn require_token(&self) -> Result<String, CommandError> {
        self.session
            .effective_token()
            .await?
            .ok_or(CommandError::Registry(RegistryError::NotAuthenticated))
    }

    /// Publish `config` under `namespace`. Returns the new entry's id.
    pub async fn publish(&self, config: &ServerConfig, namespace: &str) -> Result<String, CommandError> {
        let token = self.require_token().await?;
        let namespace = Namespace::parse(namespace.trim())?;
        let id = self.client.publish_entry(config, &namespace, &token).await?;
        info!(%id, "published server");
        Ok(id)
    }

    pub async fn details(&self, id: &str) -> Result<RegistryEntry, CommandError> {
        let token = self.session.effective_token().await?;
        Ok(self.client.get_entry(id, token.as_deref()).await?)
    }

    pub async fn update(&self, id: &str, updates: &Map<String, Value>) -> Result<(), CommandError> {
        if updates.is_empty() {
            return Err(CommandError::EmptyUpdate);
        }
        let token = self.require_token().await?;
        self.client.update_entry(id, updates, &token).await?;
        info!(%id, "updated server");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), CommandError> {
        let token = self.require_token().await?;
        self.client.delete_entry(id, &token).await?;
        info!(%id, "deleted server");
        Ok(())
    }

    pub async fn health(&self) -> bool {
        self.client.check_health().await
    }
}

fn secret_store(storage: TokenStorage, paths: &Paths) -> Arc<dyn SecretStore> {
    match storage {
        TokenStorage::Keyring => Arc::new(KeyringSecretStore::new(KEYRING_SERVICE)),
        TokenStorage::File => Arc::new(FileSecretStore::new(paths.secrets_file())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_replace_file_fields() {
        let base = json!({"name": "old", "tags": ["x"]}).as_object().cloned().unwrap();
        let fields = UpdateFields {
            name: Some("new".into()),
            version: Some("2.0.0".into()),
            endpoint: Some(String::new()),
            ..Default::default()
        };
        let merged = fields.apply(base);
        assert_eq!(
            Value::Object(merged),
            json!({"name": "new", "version": "2.0.0", "tags": ["x"]})
        );
    }

    #[test]
    fn no_overrides_no_file_is_empty() {
        assert!(UpdateFields::default().apply(Map::new()).is_empty());
    }

    #[test]
    fn token_goes_to_keyring_unless_configured() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::in_dir(dir.path());

        let registry = Registry::open(&paths).unwrap();
        assert_eq!(registry.settings().token_storage, TokenStorage::Keyring);
        assert!(registry.session().secrets_location().starts_with("system keyring"));

        crate::config::set_config_value(paths.config_file(), "token_storage", "file").unwrap();
        let registry = Registry::open(&paths).unwrap();
        assert_eq!(
            registry.session().secrets_location(),
            paths.secrets_file().display().to_string()
        );
    }
}
