//! # Command Line Interface
//!
//! Operator commands for checking configuration, reading the currently
//! deployed certificate, installing a certificate by hand and managing the
//! stored account identity.

pub mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::PrivateKeyDer;
use tracing::info;

use crate::cert::Certificate;
use crate::config::{AppConfig, CertificateConfig, StateBackendConfig};
use crate::context::OpContext;
use crate::identity::{Email, Identity};
use crate::observability::init_logging;
use crate::registry::Registry;

use output::{print_output, CertificateSummary, ConfigSummary, IdentitySummary, OutputFormat};

#[derive(Parser)]
#[command(name = "certforgot")]
#[command(about = "TLS certificate lifecycle tooling")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "certforgot.yaml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Per-operation timeout in seconds
    #[arg(long, global = true, default_value = "60")]
    pub timeout: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration file
    Validate,

    /// Read the currently deployed certificate from its source
    Fetch {
        /// Certificate name from the configuration
        cert: String,
    },

    /// Install a certificate and private key to the configured installer
    Install {
        /// Certificate name from the configuration
        cert: String,

        /// PEM file holding the certificate
        #[arg(long)]
        cert_file: PathBuf,

        /// PEM file holding the private key
        #[arg(long)]
        key_file: PathBuf,
    },

    /// Account identity state commands
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
pub enum StateCommands {
    /// Report whether an identity is stored
    Exists,

    /// Show the stored identity without key material
    Show,

    /// Generate and store a new RSA account identity
    Init {
        /// Account email, defaults to the configured ACME email
        #[arg(long)]
        email: Option<String>,

        /// RSA modulus size
        #[arg(long, default_value = "2048")]
        key_bits: usize,

        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    init_logging(&logging)?;
    crate::install_rustls_provider();

    let ctx = OpContext::new().with_timeout(Duration::from_secs(cli.timeout));
    let registry = Registry::new();

    match cli.command {
        Commands::Validate => handle_validate(&config, cli.output),
        Commands::Fetch { cert } => handle_fetch(&config, &registry, &ctx, &cert, cli.output).await,
        Commands::Install { cert, cert_file, key_file } => {
            handle_install(&config, &registry, &ctx, &cert, &cert_file, &key_file).await
        }
        Commands::State { command } => handle_state_command(command, &config, &registry, &ctx, cli.output).await,
    }
}

fn find_cert<'a>(config: &'a AppConfig, name: &str) -> anyhow::Result<&'a CertificateConfig> {
    match config.certificate(name) {
        Some(cert) => Ok(cert),
        None => bail!("Certificate '{}' is not in the configuration", name),
    }
}

fn handle_validate(config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let state_backend = match config.state.backend()? {
        StateBackendConfig::Local(_) => "local",
        StateBackendConfig::Sql(_) => "sql",
        StateBackendConfig::AzureBlob(_) => "azureblob",
        StateBackendConfig::AzureKeyVault(_) => "azurekeyvault",
    };
    let summary = ConfigSummary {
        acme_server: config.acme.server.clone(),
        email: config.acme.email.to_string(),
        state_backend: state_backend.to_string(),
        validators: config.validators.iter().map(|v| v.name.clone()).collect(),
        certs: config.certs.iter().map(|c| c.metadata.name.clone()).collect(),
    };
    print_output(&summary, format)
}

async fn handle_fetch(
    config: &AppConfig,
    registry: &Registry,
    ctx: &OpContext,
    name: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let cert_config = find_cert(config, name)?;
    let source = registry.source(&cert_config.source)?;
    let certificate = source
        .get(ctx)
        .await
        .with_context(|| format!("Failed to fetch certificate '{}' from {}", name, cert_config.source.location))?;

    let summary = CertificateSummary::new(name, certificate.info(), config.policy_for(cert_config));
    info!(cert = %name, renewal_due = summary.renewal_due, "Fetched certificate");
    print_output(&summary, format)
}

async fn handle_install(
    config: &AppConfig,
    registry: &Registry,
    ctx: &OpContext,
    name: &str,
    cert_file: &Path,
    key_file: &Path,
) -> anyhow::Result<()> {
    let cert_config = find_cert(config, name)?;

    let cert_pem = tokio::fs::read(cert_file)
        .await
        .with_context(|| format!("Failed to read {}", cert_file.display()))?;
    let certificate = Certificate::from_pem(&cert_pem)
        .with_context(|| format!("Failed to parse certificate {}", cert_file.display()))?;
    let key = PrivateKeyDer::from_pem_file(key_file)
        .map_err(|e| anyhow::anyhow!("Failed to read private key {}: {}", key_file.display(), e))?;

    let installer = registry.installer(&cert_config.installer)?;
    installer
        .install(ctx, &certificate, &key)
        .await
        .with_context(|| format!("Failed to install certificate '{}' to {}", name, cert_config.installer.location))?;

    println!("Installed certificate '{}' to {}", name, cert_config.installer.location);
    Ok(())
}

async fn handle_state_command(
    command: StateCommands,
    config: &AppConfig,
    registry: &Registry,
    ctx: &OpContext,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let store = registry.state_store(&config.state).await?;

    match command {
        StateCommands::Exists => {
            let exists = store.exists(ctx).await?;
            println!("{}", exists);
        }
        StateCommands::Show => {
            let identity = store.get(ctx).await?;
            let summary = IdentitySummary {
                backend: store.backend_type().to_string(),
                email: identity.email.to_string(),
                key_type: identity.signing_key.kty().to_string(),
                private_key_present: identity.signing_key.is_private(),
            };
            print_output(&summary, format)?;
        }
        StateCommands::Init { email, key_bits, force } => {
            if !force && store.exists(ctx).await? {
                bail!("An identity is already stored in the {} backend; pass --force to replace it", store.backend_type());
            }
            let email = match email {
                Some(raw) => Email::parse(&raw)?,
                None => config.acme.email.clone(),
            };
            let identity = tokio::task::spawn_blocking(move || Identity::generate_rsa(email, key_bits))
                .await
                .context("Key generation task failed")??;
            store.update(ctx, &identity).await?;
            println!("Stored identity for {} in the {} backend", identity.email, store.backend_type());
        }
    }

    Ok(())
}
