//! # Configuration Management
//!
//! The configuration is a YAML document, optionally overlaid by environment
//! variables of the form `CERTFORGOT__SECTION__KEY` (for example
//! `CERTFORGOT__LOGGING__LEVEL=debug`).

pub mod duration;
pub mod settings;

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::errors::Result;

pub use duration::{format_duration, parse_duration};
pub use settings::{
    AcmeConfig, AppConfig, AzureBlobStateConfig, AzureKeyVaultStateConfig, CertificateConfig,
    CertificateMetadata, CertificatePolicy, InstallerConfig, LocalStateConfig, LoggingConfig,
    SourceConfig, SqlStateConfig, StateBackendConfig, StateConfig, ValidatorConfig,
};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "CERTFORGOT";

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true)
}

impl AppConfig {
    /// Load and validate the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::build(File::from(path).format(FileFormat::Yaml), environment())?;
        debug!(path = %path.display(), certs = config.certs.len(), "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate a YAML document, still honouring environment overrides
    pub fn from_yaml_str(document: &str) -> Result<Self> {
        Self::build(File::from_str(document, FileFormat::Yaml), environment())
    }

    fn build<S>(file: S, env: Environment) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: AppConfig = Config::builder().add_source(file).add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
