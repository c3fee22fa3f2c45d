//! # Keyward Auth - Federated Sign-In and Session Lifecycle
//!
//! Lets a client sign in with Google and receive a short-lived bearer access
//! token plus a long-lived refresh credential, without the service storing
//! passwords.
//!
//! ## Architecture
//!
//! - [`identity`] - Provider trust boundary ([`IdentityVerifier`]): Google
//!   authorization code or Google ID token
//! - [`store`] - [`UserDirectory`] and [`SessionStore`] contracts, in-memory
//!   and Postgres (`postgres` feature) implementations
//! - [`token`] - HS256 access tokens and refresh-credential generation
//! - [`orchestrator`] - [`AuthOrchestrator`]: login, refresh, validate, logout
//! - [`reaper`] - Background deletion of expired sessions
//! - [`context`] - Per-request cancellation and deadlines
//! - [`jwt`] - JWKS cache and JWT validator for provider-issued tokens
//! - [`config`] - Immutable [`AuthConfig`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keyward_auth::{
//!     AuthConfig, AuthOrchestrator, CallContext, GoogleConfig, InMemoryStore, build_verifier,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let google = GoogleConfig::new("client-id", "client-secret", "https://app.example.com/callback");
//! let verifier = build_verifier(&google)?;
//! let config = AuthConfig::builder("a-signing-secret-of-at-least-32-bytes!", google).build()?;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let auth = AuthOrchestrator::new(Arc::new(config), verifier, store.clone(), store);
//!
//! let ctx = CallContext::new();
//! let token = auth.login(&ctx, "4/0AX4XfWh...").await?;
//! let user_id = auth.authenticate(&token.access_token)?;
//! auth.logout(&ctx, user_id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `postgres` - [`PgStore`](store::PgStore) backed by `sqlx`

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod orchestrator;
pub mod reaper;
pub mod store;
pub mod token;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, AuthConfigBuilder, GoogleConfig, VerifierKind};
pub use context::CallContext;
pub use error::{
    AuthError, AuthResult, ConfigError, IdentityError, StoreError, StoreResult, TokenError,
};
pub use identity::{
    GOOGLE_PROVIDER, GoogleCodeVerifier, GoogleIdTokenVerifier, IdentityVerifier, build_verifier,
};
pub use orchestrator::AuthOrchestrator;
pub use reaper::spawn_session_reaper;
pub use store::{InMemoryStore, SessionStore, UserDirectory};
pub use token::{TokenIssuer, generate_refresh_credential};
pub use types::{AuthToken, BEARER, Session, User, VerifiedIdentity};

#[cfg(feature = "postgres")]
pub use store::PgStore;
