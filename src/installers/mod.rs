//! # Certificate Installers
//!
//! Destinations a renewed certificate and its private key are written to.

pub mod key_vault;
pub mod local;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use rustls::pki_types::PrivateKeyDer;
use serde::{Deserialize, Serialize};

use crate::cert::Certificate;
use crate::context::OpContext;
use crate::errors::{CertforgotError, Result};

pub use key_vault::KeyVaultInstaller;
pub use local::{LocalInstaller, LocalInstallerConfig};

/// Kind of certificate installer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallerType {
    LocalPem,
    LocalDer,
    AzureKeyVault,
}

impl InstallerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalPem => "local-pem",
            Self::LocalDer => "local-der",
            Self::AzureKeyVault => "azure-key-vault",
        }
    }
}

impl FromStr for InstallerType {
    type Err = CertforgotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local-pem" => Ok(Self::LocalPem),
            "local-der" => Ok(Self::LocalDer),
            "azure-key-vault" => Ok(Self::AzureKeyVault),
            _ => Err(CertforgotError::validation_field(
                format!("Unknown certificate installer type: {}", s),
                "installer.type",
            )),
        }
    }
}

impl fmt::Display for InstallerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Writes a certificate and its private key to a destination, replacing what was there.
#[async_trait]
pub trait CertificateInstaller: Send + Sync + fmt::Debug {
    async fn install(
        &self,
        ctx: &OpContext,
        certificate: &Certificate,
        key: &PrivateKeyDer<'_>,
    ) -> Result<()>;

    fn installer_type(&self) -> InstallerType;
}
