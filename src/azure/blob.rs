//! Azure Blob Storage client bound to a single block blob.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::{debug, error, info};
use url::Url;

use super::credential::{TokenCredential, STORAGE_SCOPE};
use crate::errors::{CertforgotError, Result};

/// Storage service version sent with every request
pub const STORAGE_API_VERSION: &str = "2021-08-06";

const BLOB_NOT_FOUND: &str = "BlobNotFound";

/// Upload, download and existence probe for one blob
#[async_trait]
pub trait BlobClient: Send + Sync + fmt::Debug {
    /// Replace the blob's content
    async fn upload(&self, content: &[u8]) -> Result<()>;

    async fn download(&self) -> Result<Vec<u8>>;

    /// `false` when the blob does not exist; other failures are errors
    async fn exists(&self) -> Result<bool>;
}

/// Blob Storage REST client for `<container url>/<blob name>`
#[derive(Clone)]
pub struct AzureBlobClient {
    blob_url: Url,
    blob_name: String,
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
}

impl fmt::Debug for AzureBlobClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobClient")
            .field("blob_url", &self.blob_url.as_str())
            .field("credential", &"[TokenCredential]")
            .finish()
    }
}

impl AzureBlobClient {
    pub fn new(container_url: &str, blob_name: &str, credential: Arc<dyn TokenCredential>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CertforgotError::config(format!("Failed to create HTTP client: {}", e)))?;
        Self::with_http_client(container_url, blob_name, credential, http)
    }

    pub fn with_http_client(
        container_url: &str,
        blob_name: &str,
        credential: Arc<dyn TokenCredential>,
        http: reqwest::Client,
    ) -> Result<Self> {
        if blob_name.is_empty() {
            return Err(CertforgotError::validation_field("blob name is empty", "blob_name"));
        }
        let mut blob_url = Url::parse(container_url).map_err(|e| {
            CertforgotError::validation_field(
                format!("invalid container URL '{}': {}", container_url, e),
                "url",
            )
        })?;
        {
            let mut path = blob_url.path_segments_mut().map_err(|_| {
                CertforgotError::validation_field(format!("invalid container URL '{}'", container_url), "url")
            })?;
            path.pop_if_empty();
            for segment in blob_name.split('/').filter(|s| !s.is_empty()) {
                path.push(segment);
            }
        }

        info!(blob_url = %blob_url, "Initialized Azure blob client");
        Ok(Self { blob_url, blob_name: blob_name.to_string(), http, credential })
    }

    pub fn blob_url(&self) -> &Url {
        &self.blob_url
    }

    async fn request(&self, method: Method) -> Result<reqwest::RequestBuilder> {
        let token = self.credential.token(STORAGE_SCOPE).await?;
        Ok(self
            .http
            .request(method, self.blob_url.clone())
            .bearer_auth(token.expose_secret())
            .header("x-ms-version", STORAGE_API_VERSION))
    }

    async fn send(&self, request: reqwest::RequestBuilder, operation: &str) -> Result<reqwest::Response> {
        request.send().await.map_err(|e| {
            error!(blob = %self.blob_name, operation, error = %e, "Blob request failed");
            CertforgotError::network(e.to_string(), format!("blob {} '{}'", operation, self.blob_name))
        })
    }

    async fn check_status(&self, response: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        match status {
            StatusCode::NOT_FOUND => Err(CertforgotError::not_found("blob", self.blob_name.clone())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CertforgotError::auth(format!(
                "storage denied {} of blob '{}' ({} {})",
                operation, self.blob_name, status, error_code
            ))),
            _ => Err(CertforgotError::network(
                format!("unexpected status {} {}", status, error_code),
                format!("blob {} '{}'", operation, self.blob_name),
            )),
        }
    }
}

#[async_trait]
impl BlobClient for AzureBlobClient {
    async fn upload(&self, content: &[u8]) -> Result<()> {
        let request = self
            .request(Method::PUT)
            .await?
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, "application/x-yaml")
            .body(content.to_vec());
        let response = self.send(request, "upload").await?;
        self.check_status(response, "upload").await?;
        info!(blob = %self.blob_name, bytes = content.len(), "Uploaded blob");
        Ok(())
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let request = self.request(Method::GET).await?;
        let response = self.send(request, "download").await?;
        let response = self.check_status(response, "download").await?;
        let body = response.bytes().await.map_err(|e| {
            CertforgotError::network(e.to_string(), format!("blob download '{}'", self.blob_name))
        })?;
        debug!(blob = %self.blob_name, bytes = body.len(), "Downloaded blob");
        Ok(body.to_vec())
    }

    async fn exists(&self) -> Result<bool> {
        let request = self.request(Method::HEAD).await?;
        let response = self.send(request, "exists").await?;
        if response.status() == StatusCode::NOT_FOUND {
            // a missing container is a misconfiguration, not an absent blob
            let code = response.headers().get("x-ms-error-code").and_then(|v| v.to_str().ok());
            if let Some(code) = code.filter(|c| *c != BLOB_NOT_FOUND) {
                return Err(CertforgotError::network(
                    format!("storage returned {}", code),
                    format!("blob exists '{}'", self.blob_name),
                ));
            }
            return Ok(false);
        }
        self.check_status(response, "exists").await?;
        Ok(true)
    }
}
