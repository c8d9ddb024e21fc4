//! PEM encoding of certificates and private keys.

use ::pem::{EncodeConfig, LineEnding, Pem};
use rustls::pki_types::PrivateKeyDer;

pub const CERTIFICATE: &str = "CERTIFICATE";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";
pub const RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
pub const EC_PRIVATE_KEY: &str = "EC PRIVATE KEY";

/// Encode `der` as one PEM block with the given label, LF line endings
pub fn encode(label: &str, der: &[u8]) -> String {
    let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
    ::pem::encode_config(&Pem::new(label, der), config)
}

/// PEM label matching the key's DER structure
pub fn private_key_label(key: &PrivateKeyDer<'_>) -> &'static str {
    match key {
        PrivateKeyDer::Pkcs1(_) => RSA_PRIVATE_KEY,
        PrivateKeyDer::Sec1(_) => EC_PRIVATE_KEY,
        _ => PRIVATE_KEY,
    }
}

pub fn encode_private_key(key: &PrivateKeyDer<'_>) -> String {
    encode(private_key_label(key), key.secret_der())
}
