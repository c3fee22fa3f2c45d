//! Shared application state

use std::sync::Arc;

use keyward_auth::{AuthOrchestrator, CallContext};
use tokio_util::sync::CancellationToken;

/// State cloned into every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Login, refresh, validate and logout
    pub auth: Arc<AuthOrchestrator>,
    shutdown: CancellationToken,
}

impl AppState {
    /// State whose requests are not tied to a shutdown signal
    pub fn new(auth: Arc<AuthOrchestrator>) -> Self {
        Self::with_shutdown(auth, CancellationToken::new())
    }

    /// State whose in-flight collaborator calls are cancelled with `shutdown`
    pub fn with_shutdown(auth: Arc<AuthOrchestrator>, shutdown: CancellationToken) -> Self {
        Self { auth, shutdown }
    }

    /// Context for one request
    ///
    /// Cancelled when the server shuts down. The orchestrator's configured
    /// call timeout still applies.
    pub fn call_context(&self) -> CallContext {
        CallContext::new().with_cancellation(self.shutdown.child_token())
    }
}
