//! Identity stored as a YAML document in a local directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, Instrument};

use super::{StateBackendType, StateStore, STATE_FILE_NAME};
use crate::backend_span;
use crate::context::OpContext;
use crate::errors::{CertforgotError, Result};
use crate::identity::Identity;
use crate::utils::write_atomic;

const STATE_FILE_MODE: u32 = 0o600;

/// `<directory>/certforgot_state.yaml`
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    directory: PathBuf,
}

impl LocalStateStore {
    /// Open the store, creating `directory` if needed
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| {
            CertforgotError::io(e, format!("creating state directory '{}'", directory.display()))
        })?;
        info!(directory = %directory.display(), "Initialized local state store");
        Ok(Self { directory })
    }

    pub fn state_path(&self) -> PathBuf {
        self.directory.join(STATE_FILE_NAME)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn update(&self, ctx: &OpContext, identity: &Identity) -> Result<()> {
        let document = identity.to_yaml()?;
        let directory = self.directory.clone();
        let path = self.state_path();
        let span = backend_span!("local", "update_state", path = %path.display());

        ctx.run_blocking("local state update", move |abort| {
            write_atomic(&directory, &[(path, document.into_bytes(), STATE_FILE_MODE)], abort)
        })
        .instrument(span)
        .await?;

        info!(directory = %self.directory.display(), email = %identity.email, "Updated local state");
        Ok(())
    }

    async fn get(&self, ctx: &OpContext) -> Result<Identity> {
        let path = self.state_path();
        let span = backend_span!("local", "get_state", path = %path.display());
        let read = async {
            let document = match tokio::fs::read(&path).await {
                Ok(document) => document,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(CertforgotError::not_found("state file", path.display().to_string()))
                }
                Err(e) => {
                    return Err(CertforgotError::io(e, format!("reading state '{}'", path.display())))
                }
            };
            let identity = Identity::from_yaml(&document)
                .map_err(|e| e.with_context(path.display().to_string()))?;
            debug!(path = %path.display(), "Loaded local state");
            Ok(identity)
        };
        ctx.run("local state get", read).instrument(span).await
    }

    async fn exists(&self, ctx: &OpContext) -> Result<bool> {
        let path = self.state_path();
        let probe = async {
            tokio::fs::try_exists(&path)
                .await
                .map_err(|e| CertforgotError::io(e, format!("checking state '{}'", path.display())))
        };
        ctx.run("local state exists", probe).await
    }

    fn backend_type(&self) -> StateBackendType {
        StateBackendType::Local
    }
}
