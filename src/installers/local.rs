//! Installer that writes certificate material into a local directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rustls::pki_types::PrivateKeyDer;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

use super::{CertificateInstaller, InstallerType};
use crate::backend_span;
use crate::cert::{pem, Certificate, FileType};
use crate::context::OpContext;
use crate::errors::{CertforgotError, Result};
use crate::utils::write_atomic;

pub const DEFAULT_CERT_NAME: &str = "cert";
pub const DEFAULT_KEY_NAME: &str = "key";

/// Unix permissions; files holding key material are owner-only
const CERT_MODE: u32 = 0o644;
const KEY_MODE: u32 = 0o600;

/// Base file names (without extension) for the installed files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInstallerConfig {
    pub cert_name: String,
    pub key_name: String,
}

impl Default for LocalInstallerConfig {
    fn default() -> Self {
        Self { cert_name: DEFAULT_CERT_NAME.to_string(), key_name: DEFAULT_KEY_NAME.to_string() }
    }
}

/// Writes `<cert>.der` + `<key>.der`, or a single `<cert>.pem` holding the
/// certificate followed by the private key.
///
/// Every file is written to a temporary sibling and renamed into place, so readers
/// see either the previous content or the new content. A cancelled install that
/// has not started renaming leaves the directory as it was.
#[derive(Debug, Clone)]
pub struct LocalInstaller {
    directory: PathBuf,
    file_type: FileType,
    config: LocalInstallerConfig,
}

impl LocalInstaller {
    pub fn new(directory: impl Into<PathBuf>, file_type: FileType) -> Self {
        Self::with_config(directory, file_type, LocalInstallerConfig::default())
    }

    pub fn with_config(directory: impl Into<PathBuf>, file_type: FileType, config: LocalInstallerConfig) -> Self {
        Self { directory: directory.into(), file_type, config }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Paths `install` writes, certificate first
    pub fn target_paths(&self) -> Vec<PathBuf> {
        let ext = self.file_type.extension();
        match self.file_type {
            FileType::Der => vec![
                self.directory.join(format!("{}.{}", self.config.cert_name, ext)),
                self.directory.join(format!("{}.{}", self.config.key_name, ext)),
            ],
            FileType::Pem => vec![self.directory.join(format!("{}.{}", self.config.cert_name, ext))],
        }
    }

    fn write_files(&self, files: &[(PathBuf, Vec<u8>, u32)], abort: &CancellationToken) -> Result<()> {
        std::fs::create_dir_all(&self.directory).map_err(|e| {
            CertforgotError::io(e, format!("creating cert directory '{}'", self.directory.display()))
        })?;
        write_atomic(&self.directory, files, abort)
    }
}

#[async_trait]
impl CertificateInstaller for LocalInstaller {
    async fn install(
        &self,
        ctx: &OpContext,
        certificate: &Certificate,
        key: &PrivateKeyDer<'_>,
    ) -> Result<()> {
        let paths = self.target_paths();
        let files = match self.file_type {
            FileType::Der => vec![
                (paths[0].clone(), certificate.as_bytes().to_vec(), CERT_MODE),
                (paths[1].clone(), key.secret_der().to_vec(), KEY_MODE),
            ],
            FileType::Pem => {
                let mut bundle = certificate.to_pem();
                bundle.push_str(&pem::encode_private_key(key));
                vec![(paths[0].clone(), bundle.into_bytes(), KEY_MODE)]
            }
        };

        let installer = self.clone();
        let span = backend_span!("local", "install", directory = %self.directory.display());
        ctx.run_blocking("local install", move |abort| installer.write_files(&files, abort))
            .instrument(span)
            .await?;

        info!(
            directory = %self.directory.display(),
            file_type = %self.file_type,
            subject = %certificate.info().subject,
            "Installed certificate"
        );
        Ok(())
    }

    fn installer_type(&self) -> InstallerType {
        match self.file_type {
            FileType::Pem => InstallerType::LocalPem,
            FileType::Der => InstallerType::LocalDer,
        }
    }
}
