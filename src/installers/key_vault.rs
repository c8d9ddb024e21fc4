//! Installer that imports the certificate and key into Azure Key Vault.

use std::sync::Arc;

use async_trait::async_trait;
use rustls::pki_types::PrivateKeyDer;
use tracing::Instrument;

use super::{CertificateInstaller, InstallerType};
use crate::azure::KeyVaultClient;
use crate::backend_span;
use crate::cert::Certificate;
use crate::context::OpContext;
use crate::errors::Result;

/// Imports into a named Key Vault certificate, creating a new version each time
#[derive(Debug, Clone)]
pub struct KeyVaultInstaller {
    client: Arc<dyn KeyVaultClient>,
    certificate_name: String,
}

impl KeyVaultInstaller {
    pub fn new(client: Arc<dyn KeyVaultClient>, certificate_name: impl Into<String>) -> Self {
        Self { client, certificate_name: certificate_name.into() }
    }

    pub fn certificate_name(&self) -> &str {
        &self.certificate_name
    }
}

#[async_trait]
impl CertificateInstaller for KeyVaultInstaller {
    async fn install(
        &self,
        ctx: &OpContext,
        certificate: &Certificate,
        key: &PrivateKeyDer<'_>,
    ) -> Result<()> {
        let span = backend_span!("azure_key_vault", "install", name = %self.certificate_name);
        ctx.run(
            "key vault certificate import",
            self.client.import_certificate(&self.certificate_name, certificate, key),
        )
        .instrument(span)
        .await
    }

    fn installer_type(&self) -> InstallerType {
        InstallerType::AzureKeyVault
    }
}
