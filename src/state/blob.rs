//! Identity stored as a YAML blob in Azure Blob Storage.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, Instrument};

use super::{StateBackendType, StateStore};
use crate::azure::BlobClient;
use crate::backend_span;
use crate::context::OpContext;
use crate::errors::Result;
use crate::identity::Identity;

/// The blob client is already bound to the state blob
#[derive(Debug, Clone)]
pub struct BlobStateStore {
    client: Arc<dyn BlobClient>,
}

impl BlobStateStore {
    pub fn new(client: Arc<dyn BlobClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StateStore for BlobStateStore {
    async fn update(&self, ctx: &OpContext, identity: &Identity) -> Result<()> {
        let document = identity.to_yaml()?;
        let span = backend_span!("azure_blob", "update_state");
        ctx.run("blob state update", self.client.upload(document.as_bytes()))
            .instrument(span)
            .await?;
        info!(email = %identity.email, "Updated blob state");
        Ok(())
    }

    async fn get(&self, ctx: &OpContext) -> Result<Identity> {
        let span = backend_span!("azure_blob", "get_state");
        let document = ctx.run("blob state get", self.client.download()).instrument(span).await?;
        let identity = Identity::from_yaml(&document).map_err(|e| e.with_context("state blob"))?;
        debug!("Loaded blob state");
        Ok(identity)
    }

    async fn exists(&self, ctx: &OpContext) -> Result<bool> {
        ctx.run("blob state exists", self.client.exists()).await
    }

    fn backend_type(&self) -> StateBackendType {
        StateBackendType::AzureBlob
    }
}
