//! Authentication state: the stored bearer token and the auth-disabled flag.

use std::sync::Arc;

use tracing::info;

use crate::storage::{SecretStore, SettingsStore, StorageError};

const TOKEN_KEY: &str = "registry.auth_token";
const AUTH_DISABLED_KEY: &str = "registry.auth_disabled";

/// Session persisted across runs.
///
/// While auth is disabled no token is handed out, but the stored token is
/// kept so that re-enabling restores the previous session.
#[derive(Clone)]
pub struct SessionStore {
    secrets: Arc<dyn SecretStore>,
    settings: Arc<dyn SettingsStore>,
}

impl SessionStore {
    pub fn new(secrets: Arc<dyn SecretStore>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { secrets, settings }
    }

    /// Token to attach to requests, if any.
    pub async fn effective_token(&self) -> Result<Option<String>, StorageError> {
        if self.is_auth_disabled().await? {
            return Ok(None);
        }
        Ok(self
            .secrets
            .get(TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty()))
    }

    pub async fn store_token(&self, token: &str) -> Result<(), StorageError> {
        self.secrets.store(TOKEN_KEY, token).await?;
        info!("registry token stored");
        Ok(())
    }

    pub async fn clear_token(&self) -> Result<(), StorageError> {
        self.secrets.delete(TOKEN_KEY).await?;
        info!("registry token cleared");
        Ok(())
    }

    pub async fn set_auth_disabled(&self, disabled: bool) -> Result<(), StorageError> {
        self.settings.set_bool(AUTH_DISABLED_KEY, disabled).await?;
        info!(disabled, "registry authentication setting changed");
        Ok(())
    }

    pub async fn is_auth_disabled(&self) -> Result<bool, StorageError> {
        Ok(self
            .settings
            .get_bool(AUTH_DISABLED_KEY)
            .await?
            .unwrap_or(false))
    }

    pub async fn is_authenticated(&self) -> Result<bool, StorageError> {
        Ok(self.effective_token().await?.is_some())
    }

    /// Where the token is stored, for display.
    pub fn secrets_location(&self) -> String {
        self.secrets.location()
    }

    /// Stored token regardless of the disabled flag, for status display.
    pub async fn stored_token(&self) -> Result<Option<String>, StorageError> {
        self.secrets.get(TOKEN_KEY).await
    }
}

/// Shortened token for display: first and last 8 characters, or `***` for
/// tokens of 16 characters or fewer.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 16 {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemorySecretStore, MemorySettingsStore};

    fn memory_session() -> SessionStore {
        SessionStore::new(
            Arc::new(MemorySecretStore::default()),
            Arc::new(MemorySettingsStore::default()),
        )
    }

    #[tokio::test]
    async fn fresh_session_is_anonymous() {
        let session = memory_session();
        assert!(!session.is_auth_disabled().await.unwrap());
        assert_eq!(session.effective_token().await.unwrap(), None);
        assert!(!session.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn stored_token_authenticates_until_cleared() {
        let session = memory_session();
        session.store_token("abc").await.unwrap();
        assert_eq!(session.effective_token().await.unwrap().as_deref(), Some("abc"));
        assert!(session.is_authenticated().await.unwrap());

        session.clear_token().await.unwrap();
        assert!(!session.is_authenticated().await.unwrap());
        session.clear_token().await.unwrap();
    }

    #[tokio::test]
    async fn disabled_auth_hides_any_stored_token() {
        let session = memory_session();
        session.set_auth_disabled(true).await.unwrap();

        for token in ["first", "second", "a-much-longer-token-value"] {
            session.store_token(token).await.unwrap();
            assert_eq!(session.effective_token().await.unwrap(), None);
            assert!(!session.is_authenticated().await.unwrap());
        }
    }

    #[tokio::test]
    async fn reenabling_auth_restores_previous_token() {
        let session = memory_session();
        session.store_token("keep-me").await.unwrap();
        session.set_auth_disabled(true).await.unwrap();
        assert_eq!(session.stored_token().await.unwrap().as_deref(), Some("keep-me"));

        session.set_auth_disabled(false).await.unwrap();
        assert_eq!(session.effective_token().await.unwrap().as_deref(), Some("keep-me"));
    }

    #[test]
    fn masks_tokens() {
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token("exactly16chars!!"), "***");
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.payload.sig"), "eyJhbGci...load.sig");
    }
}
