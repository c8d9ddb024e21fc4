//! Certificate source that inspects a live TLS handshake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::tls::TlsInfo;
use tracing::{debug, warn, Instrument};
use url::Url;

use super::{CertificateSource, SourceType};
use crate::backend_span;
use crate::cert::Certificate;
use crate::context::OpContext;
use crate::errors::{CertforgotError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Returns the leaf certificate an HTTPS endpoint presents.
///
/// Each `get` sends a `HEAD` request over a new connection. The response status is
/// ignored; only the negotiated TLS session matters. If the request ends on a
/// plaintext connection (for example after a redirect to `http://`), the call fails
/// with [`CertforgotError::Insecure`].
#[derive(Debug, Clone)]
pub struct HttpsSource {
    url: Url,
    client: reqwest::Client,
}

impl HttpsSource {
    /// Source for `url`, trusting the built-in web PKI roots
    pub fn new(url: &str) -> Result<Self> {
        Self::with_root_certificates(url, &[])
    }

    /// Source for `url` that additionally trusts `roots`
    pub fn with_root_certificates(url: &str, roots: &[Certificate]) -> Result<Self> {
        let url = parse_https_url(url)?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_info(true)
            .pool_max_idle_per_host(0)
            .timeout(DEFAULT_TIMEOUT);
        for root in roots {
            let root = reqwest::Certificate::from_der(root.as_bytes())
                .map_err(|e| CertforgotError::config(format!("Invalid root certificate: {}", e)))?;
            builder = builder.add_root_certificate(root);
        }
        let client = builder
            .build()
            .map_err(|e| CertforgotError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn fetch(&self) -> Result<Certificate> {
        let response = self.client.head(self.url.clone()).send().await.map_err(|e| {
            warn!(url = %self.url, error = %e, "HEAD request failed");
            CertforgotError::network(e.to_string(), format!("unable to perform HEAD for '{}'", self.url))
        })?;

        let final_url = response.url().clone();
        let Some(tls) = response.extensions().get::<TlsInfo>() else {
            return Err(CertforgotError::insecure(final_url.to_string()));
        };
        let Some(leaf) = tls.peer_certificate() else {
            return Err(CertforgotError::insecure(final_url.to_string()));
        };

        let certificate = Certificate::from_der(leaf.to_vec())
            .map_err(|e| e.with_context(format!("certificate presented by '{}'", final_url)))?;
        debug!(
            url = %final_url,
            status = %response.status(),
            subject = %certificate.info().subject,
            "Captured peer certificate"
        );
        Ok(certificate)
    }
}

fn parse_https_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| CertforgotError::validation_field(format!("invalid url '{}': {}", raw, e), "url"))?;
    if url.scheme() != "https" {
        return Err(CertforgotError::validation_field(
            format!("invalid url '{}', scheme must be https", raw),
            "url",
        ));
    }
    Ok(url)
}

#[async_trait]
impl CertificateSource for HttpsSource {
    async fn get(&self, ctx: &OpContext) -> Result<Certificate> {
        let span = backend_span!("https", "get_certificate", url = %self.url);
        ctx.run("https certificate fetch", self.fetch()).instrument(span).await
    }

    fn source_type(&self) -> SourceType {
        SourceType::Https
    }
}
