//! Common test utilities for all integration tests.
//!
//! Provides an ephemeral PKI, a minimal TLS endpoint, and in-memory Key Vault
//! and blob clients with call counters.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use certforgot::azure::{BlobClient, KeyVaultClient};
use certforgot::cert::Certificate;
use certforgot::identity::Jwk;
use certforgot::Result;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, SanType,
};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A test CA and a leaf for `127.0.0.1` signed by it
pub struct TestPki {
    pub ca: Certificate,
    pub leaf: Certificate,
    leaf_key_der: Vec<u8>,
    pub leaf_key_pem: String,
}

impl TestPki {
    pub fn new() -> anyhow::Result<Self> {
        let ca_key = KeyPair::generate().context("generate CA key")?;
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).context("CA params")?;
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.distinguished_name.push(DnType::CommonName, "certforgot Test CA");
        let ca_cert = ca_params.self_signed(&ca_key).context("self-sign CA")?;

        let leaf_key = KeyPair::generate().context("generate leaf key")?;
        let mut leaf_params =
            CertificateParams::new(vec!["localhost".to_string()]).context("leaf params")?;
        leaf_params.distinguished_name.push(DnType::CommonName, "certforgot test leaf");
        leaf_params.subject_alt_names.push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        leaf_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let now = time::OffsetDateTime::now_utc();
        leaf_params.not_before = now - time::Duration::days(1);
        leaf_params.not_after = now + time::Duration::days(60);
        let leaf_cert = leaf_params.signed_by(&leaf_key, &ca_cert, &ca_key).context("sign leaf")?;

        Ok(Self {
            ca: Certificate::from_der(ca_cert.der().to_vec())?,
            leaf: Certificate::from_der(leaf_cert.der().to_vec())?,
            leaf_key_der: leaf_key.serialize_der(),
            leaf_key_pem: leaf_key.serialize_pem(),
        })
    }

    /// PKCS#8 private key of the leaf
    pub fn leaf_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.leaf_key_der.clone()))
    }
}

/// Serve TLS on loopback with the PKI's leaf, answering every request with `response`
pub async fn spawn_tls_server(pki: &TestPki, response: String) -> anyhow::Result<SocketAddr> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("protocol versions")?
        .with_no_client_auth()
        .with_single_cert(vec![pki.leaf.der().clone()], pki.leaf_key())
        .context("server certificate")?;
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.context("bind")?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            let acceptor = acceptor.clone();
            let response = response.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(stream).await else { return };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tls.write_all(response.as_bytes()).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    Ok(addr)
}

pub fn ok_response() -> String {
    "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
}

pub fn redirect_response(location: &str) -> String {
    format!(
        "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        location
    )
}

/// In-memory Key Vault
#[derive(Debug, Default)]
pub struct MockKeyVaultClient {
    secrets: Mutex<HashMap<String, String>>,
    keys: Mutex<HashMap<String, Jwk>>,
    certificates: Mutex<HashMap<String, Certificate>>,
    pub get_secret_calls: AtomicUsize,
    pub get_key_calls: AtomicUsize,
    pub import_certificate_calls: AtomicUsize,
}

impl MockKeyVaultClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_secret(&self, name: &str, value: &str) {
        self.secrets.lock().unwrap().insert(name.to_string(), value.to_string());
    }

    pub fn insert_certificate(&self, name: &str, certificate: Certificate) {
        self.certificates.lock().unwrap().insert(name.to_string(), certificate);
    }

    pub fn secret(&self, name: &str) -> Option<String> {
        self.secrets.lock().unwrap().get(name).cloned()
    }

    pub fn key(&self, name: &str) -> Option<Jwk> {
        self.keys.lock().unwrap().get(name).cloned()
    }

    pub fn certificate(&self, name: &str) -> Option<Certificate> {
        self.certificates.lock().unwrap().get(name).cloned()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyVaultClient for MockKeyVaultClient {
    async fn get_key(&self, name: &str, _version: &str) -> Result<Option<Jwk>> {
        self.get_key_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.key(name))
    }

    async fn import_key(&self, name: &str, key: &Jwk) -> Result<()> {
        self.keys.lock().unwrap().insert(name.to_string(), key.clone());
        Ok(())
    }

    async fn get_secret(&self, name: &str, _version: &str) -> Result<Option<String>> {
        self.get_secret_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.secret(name))
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<()> {
        self.insert_secret(name, value);
        Ok(())
    }

    async fn get_certificate(&self, name: &str, _version: &str) -> Result<Option<Certificate>> {
        Ok(self.certificate(name))
    }

    async fn import_certificate(
        &self,
        name: &str,
        certificate: &Certificate,
        _key: &PrivateKeyDer<'_>,
    ) -> Result<()> {
        self.import_certificate_calls.fetch_add(1, Ordering::SeqCst);
        self.insert_certificate(name, certificate.clone());
        Ok(())
    }
}

/// In-memory blob
#[derive(Debug, Default)]
pub struct MockBlobClient {
    content: Mutex<Option<Vec<u8>>>,
}

impl MockBlobClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> Option<Vec<u8>> {
        self.content.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobClient for MockBlobClient {
    async fn upload(&self, content: &[u8]) -> Result<()> {
        *self.content.lock().unwrap() = Some(content.to_vec());
        Ok(())
    }

    async fn download(&self) -> Result<Vec<u8>> {
        self.content()
            .ok_or_else(|| certforgot::CertforgotError::not_found("blob", "certforgot_state.yaml"))
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.content.lock().unwrap().is_some())
    }
}

/// Identity with a small symmetric key; cheap to build in every test
pub fn test_identity(email: &str) -> certforgot::identity::Identity {
    let mut params = std::collections::BTreeMap::new();
    params.insert("k".to_string(), serde_json::Value::String("c2lnbmluZy1rZXk".to_string()));
    let key = Jwk::new("oct", params).unwrap();
    certforgot::identity::Identity::new(certforgot::identity::Email::parse(email).unwrap(), key)
}

/// Identity with a freshly generated RSA key, as `state init` creates
pub fn rsa_identity(email: &str) -> certforgot::identity::Identity {
    let email = certforgot::identity::Email::parse(email).unwrap();
    certforgot::identity::Identity::generate_rsa(email, 1024).unwrap()
}
