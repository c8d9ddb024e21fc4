//! Certificate source backed by a PEM or DER file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, Instrument};

use super::{CertificateSource, SourceType};
use crate::backend_span;
use crate::cert::{Certificate, FileType};
use crate::context::OpContext;
use crate::errors::{CertforgotError, Result};

/// Reads a certificate from a file.
///
/// PEM files may contain other blocks (keys, chains); the first `CERTIFICATE`
/// block wins. DER files must hold exactly one certificate.
#[derive(Debug, Clone)]
pub struct LocalSource {
    path: PathBuf,
    file_type: FileType,
}

impl LocalSource {
    pub fn new(path: impl Into<PathBuf>, file_type: FileType) -> Self {
        Self { path: path.into(), file_type }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    async fn read(&self) -> Result<Certificate> {
        let contents = tokio::fs::read(&self.path).await.map_err(|e| {
            CertforgotError::io(e, format!("unable to read certificate at '{}'", self.path.display()))
        })?;

        let parsed = match self.file_type {
            FileType::Pem => Certificate::from_pem(&contents),
            FileType::Der => Certificate::from_der(contents),
        };
        let certificate = parsed.map_err(|e| e.with_context(self.path.display().to_string()))?;

        debug!(
            path = %self.path.display(),
            subject = %certificate.info().subject,
            "Loaded certificate from file"
        );
        Ok(certificate)
    }
}

#[async_trait]
impl CertificateSource for LocalSource {
    async fn get(&self, ctx: &OpContext) -> Result<Certificate> {
        let span = backend_span!("local", "get_certificate", path = %self.path.display());
        ctx.run("local certificate read", self.read()).instrument(span).await
    }

    fn source_type(&self) -> SourceType {
        match self.file_type {
            FileType::Pem => SourceType::LocalPem,
            FileType::Der => SourceType::LocalDer,
        }
    }
}
