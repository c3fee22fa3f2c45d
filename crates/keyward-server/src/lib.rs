//! # Keyward Server
//!
//! HTTP boundary for [`keyward_auth`]: an axum router exposing Google login,
//! refresh, validate and logout, plus the settings and logging setup used by
//! the `keyward` binary.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keyward_auth::{AuthConfig, AuthOrchestrator, GoogleConfig, InMemoryStore, build_verifier};
//! use keyward_server::{AppState, router};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let google = GoogleConfig::new("client-id", "client-secret", "https://app.example.com/callback");
//! let verifier = build_verifier(&google)?;
//! let config = AuthConfig::builder("a-signing-secret-of-at-least-32-bytes!", google).build()?;
//! let store = Arc::new(InMemoryStore::new());
//! let auth = AuthOrchestrator::new(Arc::new(config), verifier, store.clone(), store);
//!
//! let app = router(AppState::new(Arc::new(auth)));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use middleware::AuthenticatedUser;
pub use router::router;
pub use state::AppState;
