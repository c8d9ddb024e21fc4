//! Operation context: cancellation and deadlines for backend calls.
//!
//! Every I/O-bound operation on a source, installer or state store takes an
//! [`OpContext`]. Cancelling the context (or reaching its deadline) aborts the
//! in-flight future and surfaces [`CertforgotError::Cancelled`] or
//! [`CertforgotError::Timeout`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{CertforgotError, Result};

/// Cancellation token plus an optional deadline
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// A context bound to an existing cancellation token
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token, deadline: None }
    }

    /// Returns a copy of this context that also expires after `timeout`.
    ///
    /// An earlier deadline already on the context is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some((existing, budget)) if existing <= candidate => Some((existing, budget)),
            _ => Some((candidate, timeout)),
        };
        Self { token: self.token.clone(), deadline }
    }

    /// A child context: cancelled with the parent, cancellable on its own
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token(), deadline: self.deadline }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.token.is_cancelled() {
            return Err(CertforgotError::cancelled(operation));
        }

        match self.deadline {
            Some((deadline, budget)) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => {
                        debug!(operation, "Operation cancelled");
                        Err(CertforgotError::cancelled(operation))
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        debug!(operation, timeout_ms = budget.as_millis() as u64, "Operation deadline reached");
                        Err(CertforgotError::timeout(operation, budget.as_millis() as u64))
                    }
                    result = fut => result,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => {
                        debug!(operation, "Operation cancelled");
                        Err(CertforgotError::cancelled(operation))
                    }
                    result = fut => result,
                }
            }
        }
    }

    /// Run blocking `work` on the blocking pool under this context.
    ///
    /// `work` receives a token that is cancelled once the context is cancelled or
    /// expires, and is expected to stop at its next check. The task is always
    /// awaited, so the result reflects what `work` actually did: an interrupted call
    /// reports `Cancelled`/`Timeout` only when `work` gave up, and the real outcome
    /// if it had already committed.
    pub async fn run_blocking<T, F>(&self, operation: &str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    {
        if self.token.is_cancelled() {
            return Err(CertforgotError::cancelled(operation));
        }

        let abort = CancellationToken::new();
        let task_abort = abort.clone();
        let mut handle = tokio::task::spawn_blocking(move || work(&task_abort));
        let joined = |result: std::result::Result<Result<T>, tokio::task::JoinError>| {
            result.map_err(|e| CertforgotError::internal(format!("{} task failed: {}", operation, e)))?
        };

        let interrupted = tokio::select! {
            biased;
            result = &mut handle => return joined(result),
            Err(interrupted) = self.run(operation, std::future::pending::<Result<()>>()) => interrupted,
        };

        abort.cancel();
        match joined(handle.await) {
            Err(CertforgotError::Cancelled { .. }) => Err(interrupted),
            other => {
                debug!(operation, "Blocking operation finished after interruption");
                other
            }
        }
    }
}
