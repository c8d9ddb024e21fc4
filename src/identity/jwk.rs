//! JSON Web Key representation of the account signing key.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CertforgotError, Result};

/// Parameters that carry private key material and never appear in logs
const PRIVATE_PARAMS: &[&str] = &["d", "p", "q", "dp", "dq", "qi", "k", "oth"];

/// A self-describing key: the `kty` type tag plus its key parameters.
///
/// Parameters are kept verbatim so keys of any type survive a round trip through a
/// backend unchanged. Only RSA keys can be converted to and from native key types.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawJwk", into = "RawJwk")]
pub struct Jwk {
    kty: String,
    params: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct RawJwk {
    kty: String,
    #[serde(flatten)]
    params: BTreeMap<String, Value>,
}

impl TryFrom<RawJwk> for Jwk {
    type Error = CertforgotError;

    fn try_from(raw: RawJwk) -> Result<Self> {
        Self::new(raw.kty, raw.params)
    }
}

impl From<Jwk> for RawJwk {
    fn from(jwk: Jwk) -> Self {
        RawJwk { kty: jwk.kty, params: jwk.params }
    }
}

impl Jwk {
    /// Build a key from its type tag and parameters, checking the parameters the
    /// type requires are present.
    pub fn new(kty: impl Into<String>, params: BTreeMap<String, Value>) -> Result<Self> {
        let kty = kty.into();
        let required: &[&str] = match kty.as_str() {
            "RSA" => &["n", "e"],
            "EC" => &["crv", "x", "y"],
            "OKP" => &["crv", "x"],
            "oct" => &["k"],
            other => {
                return Err(CertforgotError::parse(
                    format!("unsupported key type '{}'", other),
                    "jwk",
                ))
            }
        };
        for name in required {
            match params.get(*name) {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => {
                    return Err(CertforgotError::parse(
                        format!("{} key is missing parameter '{}'", kty, name),
                        "jwk",
                    ))
                }
            }
        }
        Ok(Self { kty, params })
    }

    pub fn kty(&self) -> &str {
        &self.kty
    }

    /// Raw parameter value by JWK member name
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// True when the key carries private material
    pub fn is_private(&self) -> bool {
        self.params.contains_key("d") || self.params.contains_key("k")
    }

    /// Encode an RSA private key (two primes) as a JWK
    pub fn from_rsa_private_key(key: &RsaPrivateKey) -> Result<Self> {
        let primes = key.primes();
        if primes.len() != 2 {
            return Err(CertforgotError::encode(format!(
                "RSA keys with {} primes are not supported",
                primes.len()
            )));
        }
        let (p, q) = (&primes[0], &primes[1]);
        let one = BigUint::from(1u32);
        let dp = key.d() % &(p - &one);
        let dq = key.d() % &(q - &one);
        // p is prime, so q^(p-2) mod p is the inverse of q
        let qi = q.modpow(&(p - &BigUint::from(2u32)), p);

        let mut params = BTreeMap::new();
        for (name, value) in [
            ("n", key.n()),
            ("e", key.e()),
            ("d", key.d()),
            ("p", p),
            ("q", q),
            ("dp", &dp),
            ("dq", &dq),
            ("qi", &qi),
        ] {
            params.insert(name.to_string(), Value::String(URL_SAFE_NO_PAD.encode(value.to_bytes_be())));
        }
        Self::new("RSA", params)
    }

    /// Decode an RSA private JWK into a validated native key
    pub fn to_rsa_private_key(&self) -> Result<RsaPrivateKey> {
        if self.kty != "RSA" {
            return Err(CertforgotError::parse(format!("expected an RSA key, got '{}'", self.kty), "jwk"));
        }
        let n = self.big_uint("n")?;
        let e = self.big_uint("e")?;
        let d = self.big_uint("d")?;
        let p = self.big_uint("p")?;
        let q = self.big_uint("q")?;

        let key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| CertforgotError::parse(e.to_string(), "jwk"))?;
        key.validate().map_err(|e| CertforgotError::parse(e.to_string(), "jwk"))?;
        Ok(key)
    }

    fn big_uint(&self, name: &str) -> Result<BigUint> {
        let encoded = match self.params.get(name) {
            Some(Value::String(s)) => s,
            _ => {
                return Err(CertforgotError::parse(format!("missing parameter '{}'", name), "jwk"))
            }
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| CertforgotError::parse(format!("parameter '{}': {}", name, e), "jwk"))?;
        Ok(BigUint::from_bytes_be(&bytes))
    }
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        map.entry(&"kty", &self.kty);
        for (name, value) in &self.params {
            if PRIVATE_PARAMS.contains(&name.as_str()) {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ec_key() -> Jwk {
        serde_json::from_value(json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
            "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0",
            "d": "jpsQnnGQmL-YBIffH1136cspYG6-0iY7X1fCE9-E9LI",
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_ec_key() {
        let key = ec_key();
        assert_eq!(key.kty(), "EC");
        assert!(key.is_private());
        assert_eq!(key.param("crv"), Some(&json!("P-256")));
    }

    #[test]
    fn test_rejects_missing_parameters() {
        let err = serde_json::from_value::<Jwk>(json!({"kty": "RSA", "n": "AQAB"})).unwrap_err();
        assert!(err.to_string().contains("missing parameter 'e'"));

        let err = serde_json::from_value::<Jwk>(json!({"kty": "XYZ"})).unwrap_err();
        assert!(err.to_string().contains("unsupported key type"));
    }

    #[test]
    fn test_json_preserves_unknown_members() {
        let original = json!({"kty": "oct", "k": "c2VjcmV0", "kid": "account-1", "alg": "HS256"});
        let key: Jwk = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(serde_json::to_value(&key).unwrap(), original);
    }

    #[test]
    fn test_debug_redacts_private_parameters() {
        let rendered = format!("{:?}", ec_key());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("jpsQnnGQmL"));
        assert!(rendered.contains("P-256"));
    }

    #[test]
    fn test_rsa_round_trip() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let jwk = Jwk::from_rsa_private_key(&key).unwrap();
        assert_eq!(jwk.kty(), "RSA");
        assert_eq!(jwk.param("e"), Some(&json!("AQAB")));

        let restored = jwk.to_rsa_private_key().unwrap();
        assert_eq!(restored, key);
    }

    #[test]
    fn test_rsa_conversion_rejects_other_types() {
        let err = ec_key().to_rsa_private_key().unwrap_err();
        assert!(matches!(err, CertforgotError::Parse { .. }));
    }
}
