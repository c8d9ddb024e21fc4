//! # Structured Logging
//!
//! Subscriber setup and span macros for backend operations.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::LoggingConfig;
use crate::errors::{CertforgotError, Result};

/// Create a tracing span for a backend operation.
///
/// ```rust,ignore
/// let span = backend_span!("local", "install");
/// let span = backend_span!("azure_key_vault", "get", name = "web-cert");
/// ```
#[macro_export]
macro_rules! backend_span {
    ($backend:expr, $operation:expr) => {
        tracing::debug_span!(
            "backend_operation",
            backend = %$backend,
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($backend:expr, $operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "backend_operation",
            backend = %$backend,
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more than
/// once (for example from tests) leaves the first subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), &config.level)?;

    let installed = if config.json {
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).json().finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    }
    Ok(())
}

fn build_filter(rust_log: Option<&str>, level: &str) -> Result<EnvFilter> {
    let directives = rust_log.filter(|d| !d.is_empty()).unwrap_or(level);
    EnvFilter::try_new(directives).map_err(|e| CertforgotError::config(format!("Invalid log filter '{}': {}", directives, e)))
}
