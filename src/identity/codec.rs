//! Encodings of the signing key used by the state backends.
//!
//! * JSON: the JWK object itself (vault key import, SQL column).
//! * Text: standard base64 of the JSON (embedding in YAML documents).

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::Jwk;
use crate::errors::{CertforgotError, Result};

pub fn encode_json(key: &Jwk) -> Result<String> {
    serde_json::to_string(key).map_err(|e| CertforgotError::Serialization {
        source: e,
        context: "encoding signing key as JSON".to_string(),
    })
}

pub fn decode_json(json: &[u8]) -> Result<Jwk> {
    serde_json::from_slice(json).map_err(|e| CertforgotError::parse(e.to_string(), "signing key JSON"))
}

pub fn encode_text(key: &Jwk) -> Result<String> {
    Ok(STANDARD.encode(encode_json(key)?))
}

pub fn decode_text(text: &str) -> Result<Jwk> {
    let json = STANDARD
        .decode(text.trim())
        .map_err(|e| CertforgotError::parse(e.to_string(), "signing key text"))?;
    decode_json(&json)
}

/// Serde adapter: writes base64 text, reads either base64 text or an inline JWK object.
pub mod text_or_object {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{decode_text, encode_text};
    use crate::identity::Jwk;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Object(Jwk),
    }

    pub fn serialize<S: Serializer>(key: &Jwk, serializer: S) -> Result<S::Ok, S::Error> {
        let text = encode_text(key).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Jwk, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => decode_text(&text).map_err(serde::de::Error::custom),
            Repr::Object(key) => Ok(key),
        }
    }
}
