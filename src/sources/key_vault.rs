//! Certificate source backed by an Azure Key Vault certificate object.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, Instrument};

use super::{CertificateSource, SourceType};
use crate::azure::KeyVaultClient;
use crate::backend_span;
use crate::cert::Certificate;
use crate::context::OpContext;
use crate::errors::{CertforgotError, Result};

/// Latest version of a named Key Vault certificate
#[derive(Debug, Clone)]
pub struct KeyVaultSource {
    client: Arc<dyn KeyVaultClient>,
    certificate_name: String,
}

impl KeyVaultSource {
    pub fn new(client: Arc<dyn KeyVaultClient>, certificate_name: impl Into<String>) -> Self {
        Self { client, certificate_name: certificate_name.into() }
    }

    pub fn certificate_name(&self) -> &str {
        &self.certificate_name
    }

    async fn fetch(&self) -> Result<Certificate> {
        let certificate = self
            .client
            .get_certificate(&self.certificate_name, "")
            .await?
            .ok_or_else(|| CertforgotError::not_found("certificate", self.certificate_name.clone()))?;
        debug!(
            certificate = %self.certificate_name,
            subject = %certificate.info().subject,
            "Fetched certificate from Key Vault"
        );
        Ok(certificate)
    }
}

#[async_trait]
impl CertificateSource for KeyVaultSource {
    async fn get(&self, ctx: &OpContext) -> Result<Certificate> {
        let span = backend_span!("azure_key_vault", "get_certificate", name = %self.certificate_name);
        ctx.run("key vault certificate fetch", self.fetch()).instrument(span).await
    }

    fn source_type(&self) -> SourceType {
        SourceType::AzureKeyVault
    }
}
