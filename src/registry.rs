//! # Backend Registry
//!
//! Builds sources, installers and state stores from their configuration
//! entries. Azure clients share one credential, resolved on first use.

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::azure::{default_credential, AzureBlobClient, AzureKeyVaultClient, TokenCredential};
use crate::cert::FileType;
use crate::config::{InstallerConfig, SourceConfig, StateBackendConfig, StateConfig};
use crate::errors::Result;
use crate::installers::{CertificateInstaller, InstallerType, KeyVaultInstaller, LocalInstaller};
use crate::sources::{CertificateSource, HttpsSource, KeyVaultSource, LocalSource, SourceType};
use crate::state::{
    BlobStateStore, KeyVaultStateConfig, KeyVaultStateStore, LocalStateStore, SqlStateStore, StateStore,
};
use crate::utils::split_vault_location;

/// Factory for configured backends
#[derive(Debug, Default)]
pub struct Registry {
    credential: OnceLock<Arc<dyn TokenCredential>>,
}

impl Registry {
    /// Registry that reads the Azure credential from the environment when first needed
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a fixed Azure credential
    pub fn with_credential(credential: Arc<dyn TokenCredential>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(credential);
        Self { credential: cell }
    }

    fn credential(&self) -> Result<Arc<dyn TokenCredential>> {
        if let Some(credential) = self.credential.get() {
            return Ok(credential.clone());
        }
        let credential: Arc<dyn TokenCredential> = Arc::new(default_credential()?);
        Ok(self.credential.get_or_init(|| credential).clone())
    }

    fn key_vault_client(&self, vault_url: &str) -> Result<Arc<AzureKeyVaultClient>> {
        Ok(Arc::new(AzureKeyVaultClient::new(vault_url, self.credential()?)?))
    }

    /// Build the source described by `config`
    pub fn source(&self, config: &SourceConfig) -> Result<Arc<dyn CertificateSource>> {
        let source: Arc<dyn CertificateSource> = match config.kind {
            SourceType::LocalPem => Arc::new(LocalSource::new(&config.location, FileType::Pem)),
            SourceType::LocalDer => Arc::new(LocalSource::new(&config.location, FileType::Der)),
            SourceType::Https => Arc::new(HttpsSource::new(&config.location)?),
            SourceType::AzureKeyVault => {
                let (vault_url, name) = split_vault_location(&config.location)?;
                Arc::new(KeyVaultSource::new(self.key_vault_client(&vault_url)?, name))
            }
        };
        info!(source_type = %config.kind, location = %config.location, "Built certificate source");
        Ok(source)
    }

    /// Build the installer described by `config`
    pub fn installer(&self, config: &InstallerConfig) -> Result<Arc<dyn CertificateInstaller>> {
        let installer: Arc<dyn CertificateInstaller> = match config.kind {
            InstallerType::LocalPem => Arc::new(LocalInstaller::new(&config.location, FileType::Pem)),
            InstallerType::LocalDer => Arc::new(LocalInstaller::new(&config.location, FileType::Der)),
            InstallerType::AzureKeyVault => {
                let (vault_url, name) = split_vault_location(&config.location)?;
                Arc::new(KeyVaultInstaller::new(self.key_vault_client(&vault_url)?, name))
            }
        };
        info!(installer_type = %config.kind, location = %config.location, "Built certificate installer");
        Ok(installer)
    }

    /// Open the configured state store. SQL stores have their schema created.
    pub async fn state_store(&self, config: &StateConfig) -> Result<Arc<dyn StateStore>> {
        let store: Arc<dyn StateStore> = match config.backend()? {
            StateBackendConfig::Local(local) => Arc::new(LocalStateStore::new(&local.directory)?),
            StateBackendConfig::Sql(sql) => {
                let store = SqlStateStore::connect(&sql.driver, &sql.connection_string).await?;
                store.migrate().await?;
                Arc::new(store)
            }
            StateBackendConfig::AzureBlob(blob) => {
                let client = AzureBlobClient::new(&blob.url, &blob.blob_name, self.credential()?)?;
                Arc::new(BlobStateStore::new(Arc::new(client)))
            }
            StateBackendConfig::AzureKeyVault(vault) => {
                let names = KeyVaultStateConfig {
                    email_secret_name: vault.email_secret_name.clone(),
                    key_name: vault.key_name.clone(),
                };
                Arc::new(KeyVaultStateStore::with_config(self.key_vault_client(&vault.url)?, names))
            }
        };
        info!(backend = %store.backend_type(), "Opened state store");
        Ok(store)
    }
}
