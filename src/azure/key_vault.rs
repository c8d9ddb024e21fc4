//! Azure Key Vault client: secrets, keys and certificates.
//!
//! Talks to the Key Vault data-plane REST API directly with `reqwest`. A missing
//! secret, key or certificate (HTTP 404) is reported as `Ok(None)`; it is up to the
//! caller to decide whether absence is an error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use reqwest::{Method, StatusCode};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use rustls::pki_types::PrivateKeyDer;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use url::Url;

use super::credential::{TokenCredential, KEY_VAULT_SCOPE};
use crate::cert::{pem, Certificate};
use crate::errors::{CertforgotError, Result};
use crate::identity::Jwk;

/// Key Vault REST API version
pub const API_VERSION: &str = "7.4";

/// Content type Key Vault expects for a PEM certificate bundle
const PEM_CONTENT_TYPE: &str = "application/x-pem-file";

/// Transport-level operations against one vault.
///
/// `version` selects a specific object version; the empty string means latest.
#[async_trait]
pub trait KeyVaultClient: Send + Sync + fmt::Debug {
    async fn get_key(&self, name: &str, version: &str) -> Result<Option<Jwk>>;

    async fn import_key(&self, name: &str, key: &Jwk) -> Result<()>;

    async fn get_secret(&self, name: &str, version: &str) -> Result<Option<String>>;

    async fn set_secret(&self, name: &str, value: &str) -> Result<()>;

    async fn get_certificate(&self, name: &str, version: &str) -> Result<Option<Certificate>>;

    /// Import (or overwrite) a certificate together with its private key
    async fn import_certificate(
        &self,
        name: &str,
        certificate: &Certificate,
        key: &PrivateKeyDer<'_>,
    ) -> Result<()>;
}

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

#[derive(Serialize)]
struct SetSecretParameters<'a> {
    value: &'a str,
}

#[derive(Deserialize)]
struct KeyBundle {
    key: Jwk,
}

#[derive(Serialize)]
struct ImportKeyParameters<'a> {
    key: &'a Jwk,
}

#[derive(Deserialize)]
struct CertificateBundle {
    cer: Option<String>,
}

#[derive(Serialize)]
struct ImportCertificateParameters {
    value: String,
    policy: CertificatePolicy,
}

#[derive(Serialize)]
struct CertificatePolicy {
    secret_props: SecretProperties,
}

#[derive(Serialize)]
struct SecretProperties {
    #[serde(rename = "contentType")]
    content_type: &'static str,
}

/// Key Vault REST client bound to a vault URL such as `https://myvault.vault.azure.net`
#[derive(Clone)]
pub struct AzureKeyVaultClient {
    vault_url: Url,
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
}

impl fmt::Debug for AzureKeyVaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureKeyVaultClient")
            .field("vault_url", &self.vault_url.as_str())
            .field("credential", &"[TokenCredential]")
            .finish()
    }
}

impl AzureKeyVaultClient {
    pub fn new(vault_url: &str, credential: Arc<dyn TokenCredential>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CertforgotError::config(format!("Failed to create HTTP client: {}", e)))?;
        Self::with_http_client(vault_url, credential, http)
    }

    pub fn with_http_client(
        vault_url: &str,
        credential: Arc<dyn TokenCredential>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let vault_url = Url::parse(vault_url).map_err(|e| {
            CertforgotError::validation_field(format!("invalid vault URL '{}': {}", vault_url, e), "url")
        })?;
        if vault_url.cannot_be_a_base() {
            return Err(CertforgotError::validation_field(
                format!("invalid vault URL '{}'", vault_url),
                "url",
            ));
        }

        info!(vault_url = %vault_url, "Initialized Azure Key Vault client");
        Ok(Self { vault_url, http, credential })
    }

    pub fn vault_url(&self) -> &Url {
        &self.vault_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.vault_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| CertforgotError::internal("vault URL cannot be a base"))?;
            path.pop_if_empty();
            for segment in segments.iter().filter(|s| !s.is_empty()) {
                path.push(segment);
            }
        }
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let token = self.credential.token(KEY_VAULT_SCOPE).await?;
        let mut request = self.http.request(method, url.clone()).bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| {
            error!(url = %url, error = %e, "Key Vault request failed");
            CertforgotError::network(e.to_string(), format!("Key Vault request to {}", url.path()))
        })
    }

    /// GET an object, mapping 404 to `None`
    async fn get_object<T: for<'de> Deserialize<'de>>(
        &self,
        kind: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<T>> {
        let url = self.endpoint(&[kind, name, version])?;
        let response = self.send::<()>(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(kind, name, "Key Vault object not found");
            return Ok(None);
        }
        let response = check_status(response, kind, name).await?;
        let body = response.json::<T>().await.map_err(|e| {
            CertforgotError::parse(e.to_string(), format!("Key Vault {} '{}' response", kind, name))
        })?;
        Ok(Some(body))
    }
}

async fn check_status(response: reqwest::Response, kind: &str, name: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(CertforgotError::auth(format!("Key Vault denied access to {} '{}' ({})", kind, name, status)))
        }
        StatusCode::NOT_FOUND => Err(CertforgotError::not_found(kind, name)),
        _ => Err(CertforgotError::network(
            format!("unexpected status {}: {}", status, body),
            format!("Key Vault {} '{}'", kind, name),
        )),
    }
}

fn decode_cer(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
        .map_err(|e| CertforgotError::parse(e.to_string(), "Key Vault certificate 'cer' field"))
}

/// PKCS#8 DER of `key`; PKCS#1 RSA keys are re-encoded
fn pkcs8_der(key: &PrivateKeyDer<'_>) -> Result<Vec<u8>> {
    match key {
        PrivateKeyDer::Pkcs8(der) => Ok(der.secret_pkcs8_der().to_vec()),
        PrivateKeyDer::Pkcs1(der) => {
            let rsa = RsaPrivateKey::from_pkcs1_der(der.secret_pkcs1_der())
                .map_err(|e| CertforgotError::encode(format!("invalid PKCS#1 RSA private key: {}", e)))?;
            let document = rsa
                .to_pkcs8_der()
                .map_err(|e| CertforgotError::encode(format!("failed to encode RSA key as PKCS#8: {}", e)))?;
            Ok(document.as_bytes().to_vec())
        }
        _ => Err(CertforgotError::encode("unsupported private key encoding for Key Vault import")),
    }
}

/// Base64 of a PEM bundle: the PKCS#8 private key followed by the certificate
pub fn encode_certificate_bundle(certificate: &Certificate, key: &PrivateKeyDer<'_>) -> Result<String> {
    let mut bundle = pem::encode(pem::PRIVATE_KEY, &pkcs8_der(key)?);
    bundle.push_str(&certificate.to_pem());
    Ok(STANDARD.encode(bundle))
}

#[async_trait]
impl KeyVaultClient for AzureKeyVaultClient {
    async fn get_key(&self, name: &str, version: &str) -> Result<Option<Jwk>> {
        let bundle: Option<KeyBundle> = self.get_object("keys", name, version).await?;
        Ok(bundle.map(|b| b.key))
    }

    async fn import_key(&self, name: &str, key: &Jwk) -> Result<()> {
        let url = self.endpoint(&["keys", name])?;
        let response = self.send(Method::PUT, url, Some(&ImportKeyParameters { key })).await?;
        check_status(response, "keys", name).await?;
        info!(key = %name, kty = %key.kty(), "Imported key into Key Vault");
        Ok(())
    }

    async fn get_secret(&self, name: &str, version: &str) -> Result<Option<String>> {
        let bundle: Option<SecretBundle> = self.get_object("secrets", name, version).await?;
        match bundle {
            Some(SecretBundle { value: Some(value) }) => Ok(Some(value)),
            Some(SecretBundle { value: None }) => Err(CertforgotError::parse(
                "secret has no value",
                format!("Key Vault secret '{}'", name),
            )),
            None => Ok(None),
        }
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<()> {
        let url = self.endpoint(&["secrets", name])?;
        let response = self.send(Method::PUT, url, Some(&SetSecretParameters { value })).await?;
        check_status(response, "secrets", name).await?;
        info!(secret = %name, "Set Key Vault secret");
        Ok(())
    }

    async fn get_certificate(&self, name: &str, version: &str) -> Result<Option<Certificate>> {
        let bundle: Option<CertificateBundle> = self.get_object("certificates", name, version).await?;
        let Some(bundle) = bundle else {
            return Ok(None);
        };
        let cer = bundle.cer.ok_or_else(|| {
            CertforgotError::parse("certificate has no 'cer' content", format!("Key Vault certificate '{}'", name))
        })?;
        let certificate = Certificate::from_der(decode_cer(&cer)?)?;
        Ok(Some(certificate))
    }

    async fn import_certificate(
        &self,
        name: &str,
        certificate: &Certificate,
        key: &PrivateKeyDer<'_>,
    ) -> Result<()> {
        let params = ImportCertificateParameters {
            value: encode_certificate_bundle(certificate, key)?,
            policy: CertificatePolicy {
                secret_props: SecretProperties { content_type: PEM_CONTENT_TYPE },
            },
        };
        let url = self.endpoint(&["certificates", name, "import"])?;
        let response = self.send(Method::POST, url, Some(&params)).await?;
        check_status(response, "certificates", name).await?;
        info!(certificate = %name, subject = %certificate.info().subject, "Imported certificate into Key Vault");
        Ok(())
    }
}
