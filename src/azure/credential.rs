//! Bearer tokens for the Azure REST APIs.
//!
//! Acquiring tokens (managed identity, CLI login, service principals) is left to the
//! deployment. The clients only need something that can hand them a token for a
//! resource scope.

use std::fmt;

use async_trait::async_trait;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{CertforgotError, Result};

/// Environment variable read by [`StaticTokenCredential::from_env`]
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// OAuth scope for Key Vault data-plane calls
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// OAuth scope for Blob Storage data-plane calls
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// A token string that redacts itself in Debug and Display and is zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw token. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

/// Source of bearer tokens for a given OAuth scope
#[async_trait]
pub trait TokenCredential: Send + Sync + fmt::Debug {
    async fn token(&self, scope: &str) -> Result<SecretString>;
}

/// A fixed token, used for every scope
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: SecretString,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = SecretString::new(token);
        if token.is_empty() {
            return Err(CertforgotError::validation_field("access token is empty", "token"));
        }
        Ok(Self { token })
    }

    /// Read the token from `AZURE_ACCESS_TOKEN`.
    ///
    /// Returns `Ok(None)` when the variable is not set.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) => Ok(Some(Self::new(token)?)),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn token(&self, _scope: &str) -> Result<SecretString> {
        Ok(self.token.clone())
    }
}

/// Resolve the default credential, failing when none is configured
pub fn default_credential() -> Result<StaticTokenCredential> {
    StaticTokenCredential::from_env()?.ok_or_else(|| {
        CertforgotError::auth(format!(
            "no Azure credential configured; set {} to a bearer token",
            ACCESS_TOKEN_ENV
        ))
    })
}
