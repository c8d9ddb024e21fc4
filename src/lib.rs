//! # certforgot
//!
//! Storage and delivery plumbing for a TLS certificate lifecycle manager.
//!
//! ## Core Components
//!
//! - **Sources** ([`sources`]): read the currently deployed certificate from a
//!   local PEM/DER file, a live TLS handshake, or Azure Key Vault
//! - **Installers** ([`installers`]): write a renewed certificate and key to a
//!   local directory or import them into Azure Key Vault
//! - **State** ([`state`]): persist the ACME account [`identity::Identity`]
//!   locally, in PostgreSQL, in a blob, or in Key Vault
//! - **Registry** ([`registry`]): build all of the above from [`config::AppConfig`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use certforgot::{config::AppConfig, context::OpContext, registry::Registry, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load("certforgot.yaml")?;
//!     let registry = Registry::new();
//!     let store = registry.state_store(&config.state).await?;
//!     let present = store.exists(&OpContext::new()).await?;
//!     println!("identity stored: {}", present);
//!     Ok(())
//! }
//! ```

pub mod azure;
pub mod cert;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod identity;
pub mod installers;
pub mod observability;
pub mod registry;
pub mod sources;
pub mod state;
pub mod utils;

pub use errors::{CertforgotError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Install ring as the process-wide rustls provider if none is set yet
pub fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        // Err means another thread installed one after the check.
        let _ = ring::default_provider().install_default();
    }
}
