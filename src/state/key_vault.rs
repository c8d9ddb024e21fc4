//! Identity split across a Key Vault secret (email) and a Key Vault key (signing key).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, Instrument};

use super::{StateBackendType, StateStore};
use crate::azure::KeyVaultClient;
use crate::backend_span;
use crate::context::OpContext;
use crate::errors::{CertforgotError, Result};
use crate::identity::{Email, Identity};

pub const DEFAULT_EMAIL_SECRET_NAME: &str = "certforgot-useremail";
pub const DEFAULT_KEY_NAME: &str = "certforgot-userkey";

/// Names of the vault objects holding the identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVaultStateConfig {
    pub email_secret_name: String,
    pub key_name: String,
}

impl Default for KeyVaultStateConfig {
    fn default() -> Self {
        Self {
            email_secret_name: DEFAULT_EMAIL_SECRET_NAME.to_string(),
            key_name: DEFAULT_KEY_NAME.to_string(),
        }
    }
}

/// Key Vault state store.
///
/// `update` writes the secret and then the key. The two writes are independent;
/// if the second fails the store holds a partial identity, which `exists` reports
/// as absent. Callers retry the whole update.
#[derive(Debug, Clone)]
pub struct KeyVaultStateStore {
    client: Arc<dyn KeyVaultClient>,
    config: KeyVaultStateConfig,
}

impl KeyVaultStateStore {
    pub fn new(client: Arc<dyn KeyVaultClient>) -> Self {
        Self::with_config(client, KeyVaultStateConfig::default())
    }

    pub fn with_config(client: Arc<dyn KeyVaultClient>, config: KeyVaultStateConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &KeyVaultStateConfig {
        &self.config
    }

    async fn write(&self, identity: &Identity) -> Result<()> {
        self.client
            .set_secret(&self.config.email_secret_name, &identity.email.to_string())
            .await?;
        self.client.import_key(&self.config.key_name, &identity.signing_key).await
    }

    async fn read(&self) -> Result<Identity> {
        let secret = self
            .client
            .get_secret(&self.config.email_secret_name, "")
            .await?
            .ok_or_else(|| CertforgotError::not_found("secret", self.config.email_secret_name.clone()))?;
        let email = Email::parse(&secret)
            .map_err(|e| CertforgotError::parse(e.to_string(), format!("secret '{}'", self.config.email_secret_name)))?;

        let key = self
            .client
            .get_key(&self.config.key_name, "")
            .await?
            .ok_or_else(|| CertforgotError::not_found("key", self.config.key_name.clone()))?;

        Ok(Identity::new(email, key))
    }

    async fn probe(&self) -> Result<bool> {
        if self.client.get_secret(&self.config.email_secret_name, "").await?.is_none() {
            debug!(secret = %self.config.email_secret_name, "State secret absent");
            return Ok(false);
        }
        if self.client.get_key(&self.config.key_name, "").await?.is_none() {
            debug!(key = %self.config.key_name, "State key absent");
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait]
impl StateStore for KeyVaultStateStore {
    async fn update(&self, ctx: &OpContext, identity: &Identity) -> Result<()> {
        let span = backend_span!("azure_key_vault", "update_state", key = %self.config.key_name);
        ctx.run("key vault state update", self.write(identity)).instrument(span).await?;
        info!(
            secret = %self.config.email_secret_name,
            key = %self.config.key_name,
            "Updated Key Vault state"
        );
        Ok(())
    }

    async fn get(&self, ctx: &OpContext) -> Result<Identity> {
        let span = backend_span!("azure_key_vault", "get_state", key = %self.config.key_name);
        ctx.run("key vault state get", self.read()).instrument(span).await
    }

    async fn exists(&self, ctx: &OpContext) -> Result<bool> {
        let span = backend_span!("azure_key_vault", "state_exists", key = %self.config.key_name);
        ctx.run("key vault state exists", self.probe()).instrument(span).await
    }

    fn backend_type(&self) -> StateBackendType {
        StateBackendType::AzureKeyVault
    }
}
