//! # Configuration Settings
//!
//! Defines the configuration document for certforgot. Keys are lowercase to
//! match the YAML files operators already keep.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::duration::serde_duration;
use crate::errors::{CertforgotError, Result};
use crate::identity::Email;
use crate::installers::InstallerType;
use crate::sources::SourceType;
use crate::state::key_vault::{DEFAULT_EMAIL_SECRET_NAME, DEFAULT_KEY_NAME};
use crate::state::STATE_FILE_NAME;
use crate::utils::split_vault_location;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// ACME account settings
    #[validate(nested)]
    pub acme: AcmeConfig,

    /// Where the account identity is persisted
    #[validate(nested)]
    pub state: StateConfig,

    /// Policy applied to certificates without their own
    #[serde(rename = "globalpolicy")]
    #[validate(nested)]
    pub global_policy: CertificatePolicy,

    #[serde(default)]
    #[validate(nested)]
    pub validators: Vec<ValidatorConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub certs: Vec<CertificateConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(CertforgotError::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Cross-field rules the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        self.state.backend()?;

        let mut validator_names = HashSet::new();
        for validator in &self.validators {
            if !validator_names.insert(validator.name.as_str()) {
                return Err(CertforgotError::validation_field(
                    format!("Duplicate validator name '{}'", validator.name),
                    "validators",
                ));
            }
        }

        let mut cert_names = HashSet::new();
        for cert in &self.certs {
            let name = &cert.metadata.name;
            if !cert_names.insert(name.as_str()) {
                return Err(CertforgotError::validation_field(
                    format!("Duplicate certificate name '{}'", name),
                    "certs",
                ));
            }
            if cert.metadata.domains.iter().any(|d| d.trim().is_empty()) {
                return Err(CertforgotError::validation_field(
                    format!("Certificate '{}' lists an empty domain", name),
                    "certs.metadata.domains",
                ));
            }
            if self.validator(&cert.validator).is_none() {
                return Err(CertforgotError::validation_field(
                    format!("Certificate '{}' references unknown validator '{}'", name, cert.validator),
                    "certs.validator",
                ));
            }
            cert.source.validate_location().map_err(|e| e.with_context(format!("certificate '{}'", name)))?;
            cert.installer
                .validate_location()
                .map_err(|e| e.with_context(format!("certificate '{}'", name)))?;
        }

        Ok(())
    }

    /// Look up a certificate entry by name
    pub fn certificate(&self, name: &str) -> Option<&CertificateConfig> {
        self.certs.iter().find(|c| c.metadata.name == name)
    }

    /// Look up a validator entry by name
    pub fn validator(&self, name: &str) -> Option<&ValidatorConfig> {
        self.validators.iter().find(|v| v.name == name)
    }

    /// The certificate's own policy, or the global one
    pub fn policy_for<'a>(&'a self, cert: &'a CertificateConfig) -> &'a CertificatePolicy {
        cert.policy.as_ref().unwrap_or(&self.global_policy)
    }
}

/// ACME account configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AcmeConfig {
    /// Directory URL of the ACME server
    #[validate(url(message = "ACME server must be a valid URL"))]
    pub server: String,

    /// Account contact address
    pub email: Email,
}

/// State backend selection. Exactly one field must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct StateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub local: Option<LocalStateConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub sql: Option<SqlStateConfig>,

    #[serde(rename = "azureblob", default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub azure_blob: Option<AzureBlobStateConfig>,

    #[serde(rename = "azurekeyvault", default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub azure_key_vault: Option<AzureKeyVaultStateConfig>,
}

/// The selected state backend
#[derive(Debug, Clone, Copy)]
pub enum StateBackendConfig<'a> {
    Local(&'a LocalStateConfig),
    Sql(&'a SqlStateConfig),
    AzureBlob(&'a AzureBlobStateConfig),
    AzureKeyVault(&'a AzureKeyVaultStateConfig),
}

impl StateConfig {
    /// The single configured backend
    pub fn backend(&self) -> Result<StateBackendConfig<'_>> {
        let mut configured = Vec::with_capacity(1);
        if let Some(local) = &self.local {
            configured.push(StateBackendConfig::Local(local));
        }
        if let Some(sql) = &self.sql {
            configured.push(StateBackendConfig::Sql(sql));
        }
        if let Some(blob) = &self.azure_blob {
            configured.push(StateBackendConfig::AzureBlob(blob));
        }
        if let Some(vault) = &self.azure_key_vault {
            configured.push(StateBackendConfig::AzureKeyVault(vault));
        }

        match configured.as_slice() {
            [backend] => Ok(*backend),
            [] => Err(CertforgotError::validation_field("No state backend configured", "state")),
            _ => Err(CertforgotError::validation_field(
                "Exactly one state backend must be configured",
                "state",
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LocalStateConfig {
    #[validate(length(min = 1, message = "State directory cannot be empty"))]
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SqlStateConfig {
    #[validate(length(min = 1, message = "SQL driver cannot be empty"))]
    pub driver: String,

    #[serde(rename = "connectionstring")]
    #[validate(length(min = 1, message = "Connection string cannot be empty"))]
    pub connection_string: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AzureBlobStateConfig {
    /// Container URL
    #[validate(url(message = "Blob container URL must be a valid URL"))]
    pub url: String,

    #[serde(rename = "blobname", default = "default_blob_name")]
    #[validate(length(min = 1, message = "Blob name cannot be empty"))]
    pub blob_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AzureKeyVaultStateConfig {
    #[validate(url(message = "Key Vault URL must be a valid URL"))]
    pub url: String,

    #[serde(rename = "keyname", default = "default_key_name")]
    #[validate(custom(function = "crate::utils::validate_vault_name"))]
    pub key_name: String,

    #[serde(rename = "emailsecretname", default = "default_email_secret_name")]
    #[validate(custom(function = "crate::utils::validate_vault_name"))]
    pub email_secret_name: String,
}

fn default_blob_name() -> String {
    STATE_FILE_NAME.to_string()
}

fn default_key_name() -> String {
    DEFAULT_KEY_NAME.to_string()
}

fn default_email_secret_name() -> String {
    DEFAULT_EMAIL_SECRET_NAME.to_string()
}

/// Renewal policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CertificatePolicy {
    /// Renew once the certificate has less than this much validity left
    #[serde(rename = "renewbefore", with = "serde_duration")]
    pub renew_before: Duration,
}

/// ACME challenge validator
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ValidatorConfig {
    #[validate(length(min = 1, message = "Validator name cannot be empty"))]
    pub name: String,

    /// DNS-01 provider name
    #[validate(length(min = 1, message = "DNS-01 provider cannot be empty"))]
    pub dns01: String,

    /// HTTP-01 listen port
    #[validate(range(min = 1, max = 65535, message = "HTTP-01 port must be between 1 and 65535"))]
    pub http01: u32,
}

/// One managed certificate
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CertificateConfig {
    #[validate(nested)]
    pub metadata: CertificateMetadata,

    #[validate(nested)]
    pub source: SourceConfig,

    /// Name of the validator that proves domain control
    #[validate(length(min = 1, message = "Validator reference cannot be empty"))]
    pub validator: String,

    #[validate(nested)]
    pub installer: InstallerConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub policy: Option<CertificatePolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CertificateMetadata {
    #[validate(length(min = 1, message = "Certificate name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "At least one domain is required"))]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub kind: SourceType,

    /// File path, `https://` URL or `https://<vault>/<certificate>` depending on `kind`
    #[validate(length(min = 1, message = "Source location cannot be empty"))]
    pub location: String,
}

impl SourceConfig {
    fn validate_location(&self) -> Result<()> {
        match self.kind {
            SourceType::LocalPem | SourceType::LocalDer => Ok(()),
            SourceType::Https => {
                let url = url::Url::parse(&self.location).map_err(|e| {
                    CertforgotError::validation_field(format!("Invalid source URL: {}", e), "source.location")
                })?;
                if url.scheme() != "https" {
                    return Err(CertforgotError::validation_field(
                        format!("Source URL '{}' must use https", self.location),
                        "source.location",
                    ));
                }
                Ok(())
            }
            SourceType::AzureKeyVault => split_vault_location(&self.location).map(|_| ()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InstallerConfig {
    #[serde(rename = "type")]
    pub kind: InstallerType,

    /// Target directory or `https://<vault>/<certificate>` depending on `kind`
    #[validate(length(min = 1, message = "Installer location cannot be empty"))]
    pub location: String,
}

impl InstallerConfig {
    fn validate_location(&self) -> Result<()> {
        match self.kind {
            InstallerType::LocalPem | InstallerType::LocalDer => Ok(()),
            InstallerType::AzureKeyVault => split_vault_location(&self.location).map(|_| ()),
        }
    }
}

/// Logging configuration. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}
