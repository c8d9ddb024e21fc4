//! # Certificate Sources
//!
//! Where the currently deployed certificate can be read from: a local file, the
//! certificate a live TLS endpoint presents, or a Key Vault certificate object.

pub mod https;
pub mod key_vault;
pub mod local;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cert::Certificate;
use crate::context::OpContext;
use crate::errors::{CertforgotError, Result};

pub use https::HttpsSource;
pub use key_vault::KeyVaultSource;
pub use local::LocalSource;

/// Kind of certificate source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// PEM file on disk
    LocalPem,
    /// DER file on disk
    LocalDer,
    /// Leaf certificate presented by an HTTPS endpoint
    Https,
    /// Certificate object in Azure Key Vault
    AzureKeyVault,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalPem => "local-pem",
            Self::LocalDer => "local-der",
            Self::Https => "https",
            Self::AzureKeyVault => "azure-key-vault",
        }
    }
}

impl FromStr for SourceType {
    type Err = CertforgotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local-pem" => Ok(Self::LocalPem),
            "local-der" => Ok(Self::LocalDer),
            "https" => Ok(Self::Https),
            "azure-key-vault" => Ok(Self::AzureKeyVault),
            _ => Err(CertforgotError::validation_field(
                format!("Unknown certificate source type: {}", s),
                "source.type",
            )),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Retrieves the current certificate from some origin.
///
/// Implementations hold no state between calls and are safe to share.
#[async_trait]
pub trait CertificateSource: Send + Sync + fmt::Debug {
    /// Fetch the certificate
    async fn get(&self, ctx: &OpContext) -> Result<Certificate>;

    fn source_type(&self) -> SourceType;
}
