//! # Account Identity
//!
//! The durable identity of the certificate requester: a mailbox and a signing key.
//! Every state backend maps its native data model onto [`Identity`].

pub mod codec;
pub mod email;
pub mod jwk;

use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};

use crate::errors::{CertforgotError, Result};

pub use email::Email;
pub use jwk::Jwk;

/// Email address plus signing key. Always stored and loaded as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "userEmail")]
    pub email: Email,
    #[serde(rename = "userPrivateKey", with = "codec::text_or_object")]
    pub signing_key: Jwk,
}

impl Identity {
    pub fn new(email: Email, signing_key: Jwk) -> Self {
        Self { email, signing_key }
    }

    /// Rebuild an identity from a mailbox string and a JWK JSON document
    pub fn from_encoded(email: &str, signing_key_json: &[u8]) -> Result<Self> {
        Ok(Self {
            email: Email::parse(email)?,
            signing_key: codec::decode_json(signing_key_json)?,
        })
    }

    /// Fresh identity with a newly generated RSA signing key
    pub fn generate_rsa(email: Email, bits: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CertforgotError::internal(format!("RSA key generation failed: {}", e)))?;
        Ok(Self::new(email, Jwk::from_rsa_private_key(&key)?))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| CertforgotError::encode(e.to_string()))
    }

    pub fn from_yaml(document: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(document).map_err(|e| CertforgotError::parse(e.to_string(), "identity document"))
    }
}
