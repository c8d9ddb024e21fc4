//! # Certificates
//!
//! The X.509 certificate value that flows from a source to an installer, plus the
//! file encodings (PEM and DER) the local backends understand.

pub mod pem;

use std::fmt;
use std::str::FromStr;

use rustls::pki_types::{pem::PemObject, CertificateDer};
use time::OffsetDateTime;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::errors::{CertforgotError, Result};

/// File encoding of certificate material on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Pem,
    Der,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pem => "pem",
            FileType::Der => "der",
        }
    }

    /// File name extension, without the dot
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for FileType {
    type Err = CertforgotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pem" => Ok(FileType::Pem),
            "der" => Ok(FileType::Der),
            other => Err(CertforgotError::validation_field(
                format!("unknown file type '{}', expected pem or der", other),
                "file_type",
            )),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata extracted from a certificate for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl CertificateInfo {
    /// Time left until expiry; negative once expired
    pub fn remaining_validity(&self) -> time::Duration {
        self.not_after - OffsetDateTime::now_utc()
    }
}

/// A single DER-encoded X.509 certificate that is known to parse.
///
/// Equality is byte equality of the encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: CertificateDer<'static>,
    info: CertificateInfo,
}

impl Certificate {
    /// Parse a DER certificate. Trailing bytes after the certificate are rejected.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes: Vec<u8> = der.into();
        let info = {
            let (rest, parsed) = X509Certificate::from_der(&bytes)
                .map_err(|e| CertforgotError::parse(e.to_string(), "DER certificate"))?;
            if !rest.is_empty() {
                return Err(CertforgotError::parse(
                    format!("{} trailing bytes after certificate", rest.len()),
                    "DER certificate",
                ));
            }
            CertificateInfo {
                subject: parsed.subject().to_string(),
                issuer: parsed.issuer().to_string(),
                serial: parsed.raw_serial_as_string(),
                not_before: parsed.validity().not_before.to_datetime(),
                not_after: parsed.validity().not_after.to_datetime(),
            }
        };
        Ok(Self { der: CertificateDer::from(bytes), info })
    }

    /// Parse the first `CERTIFICATE` block of a PEM document, skipping other blocks
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let first = CertificateDer::pem_slice_iter(pem)
            .next()
            .ok_or_else(|| CertforgotError::parse("no CERTIFICATE block found", "PEM document"))?
            .map_err(|e| CertforgotError::parse(e.to_string(), "PEM document"))?;
        Self::from_der(first.as_ref())
    }

    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.der.as_ref()
    }

    pub fn info(&self) -> &CertificateInfo {
        &self.info
    }

    pub fn to_pem(&self) -> String {
        pem::encode(pem::CERTIFICATE, self.as_bytes())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.info.subject)
            .field("issuer", &self.info.issuer)
            .field("not_after", &self.info.not_after)
            .field("der_len", &self.der.len())
            .finish()
    }
}
