//! Per-request cancellation and deadlines
//!
//! Every collaborator call the orchestrator makes goes through
//! [`CallContext::bounded`], which races it against the caller's
//! cancellation token and a deadline.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Caller-supplied cancellation signal and optional deadline
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl CallContext {
    /// Context that is never cancelled and uses the configured deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cancel` as the cancellation signal
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Per-call deadline, overriding the configured one when shorter
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The cancellation token
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True once the caller has cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn effective_timeout(&self, configured: Option<Duration>) -> Option<Duration> {
        match (self.timeout, configured) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Run `fut`, giving up on cancellation or when the deadline passes
    ///
    /// # Errors
    ///
    /// [`AuthError::Cancelled`] if the token fires first (or already fired),
    /// [`AuthError::Timeout`] if the deadline elapses first.
    pub async fn bounded<F>(
        &self,
        operation: &'static str,
        configured_timeout: Option<Duration>,
        fut: F,
    ) -> AuthResult<F::Output>
    where
        F: Future,
    {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let timeout = self.effective_timeout(configured_timeout);
        let guarded = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                    warn!(operation, timeout_ms = limit.as_millis() as u64, "Collaborator call timed out");
                    AuthError::Timeout {
                        operation,
                        timeout_ms: limit.as_millis() as u64,
                    }
                }),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AuthError::Cancelled),
            result = guarded => result,
        }
    }
}
