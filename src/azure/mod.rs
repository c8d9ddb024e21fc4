//! # Azure Backend Clients
//!
//! Thin REST clients for the Azure services the sources, installers and state
//! stores can use: Key Vault (secrets, keys, certificates) and Blob Storage.

pub mod blob;
pub mod credential;
pub mod key_vault;

pub use blob::{AzureBlobClient, BlobClient};
pub use credential::{default_credential, SecretString, StaticTokenCredential, TokenCredential};
pub use key_vault::{AzureKeyVaultClient, KeyVaultClient};
