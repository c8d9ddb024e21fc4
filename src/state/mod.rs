//! # Identity State Stores
//!
//! Persistence for the single account [`Identity`] across restarts. Every backend
//! stores the identity as a whole and can report whether one exists without
//! decoding it.

pub mod blob;
pub mod key_vault;
pub mod local;
pub mod sql;

use std::fmt;

use async_trait::async_trait;

use crate::context::OpContext;
use crate::errors::Result;
use crate::identity::Identity;

pub use blob::BlobStateStore;
pub use key_vault::{KeyVaultStateConfig, KeyVaultStateStore};
pub use local::LocalStateStore;
pub use sql::SqlStateStore;

/// File and blob name of the serialized identity document
pub const STATE_FILE_NAME: &str = "certforgot_state.yaml";

/// Kind of state backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateBackendType {
    Local,
    Sql,
    AzureBlob,
    AzureKeyVault,
}

impl StateBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sql => "sql",
            Self::AzureBlob => "azure_blob",
            Self::AzureKeyVault => "azure_key_vault",
        }
    }
}

impl fmt::Display for StateBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable storage for the account identity
#[async_trait]
pub trait StateStore: Send + Sync + fmt::Debug {
    /// Create or replace the stored identity
    async fn update(&self, ctx: &OpContext, identity: &Identity) -> Result<()>;

    /// Load the stored identity; `NotFound` when there is none
    async fn get(&self, ctx: &OpContext) -> Result<Identity>;

    /// Whether an identity is stored
    async fn exists(&self, ctx: &OpContext) -> Result<bool>;

    fn backend_type(&self) -> StateBackendType;
}
