//! Identity verification: provider credential in, verified identity out
//!
//! Two Google variants implement [`IdentityVerifier`]:
//!
//! | Variant | Credential | Trust anchor |
//! |---------|------------|--------------|
//! | [`GoogleCodeVerifier`] | authorization code | token + userinfo endpoints |
//! | [`GoogleIdTokenVerifier`] | ID token | Google JWKS |
//!
//! The deployment picks one through [`VerifierKind`]; the orchestrator only
//! sees the trait. Both fail closed: transport, decoding and claim failures
//! all come back as [`IdentityError`].

pub mod google;
pub mod id_token;

pub use google::GoogleCodeVerifier;
pub use id_token::GoogleIdTokenVerifier;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{GoogleConfig, VerifierKind};
use crate::error::IdentityError;
use crate::types::VerifiedIdentity;

/// Provider name used in routes (`/auth/google`)
pub const GOOGLE_PROVIDER: &str = "google";

/// Turns a provider-issued credential into a verified identity
#[async_trait]
pub trait IdentityVerifier: Send + Sync + std::fmt::Debug {
    /// Provider name, matched against the login route
    fn provider(&self) -> &'static str;

    /// Name of the request parameter that carries the credential
    fn credential_param(&self) -> &'static str;

    /// Verify `credential` with the provider
    ///
    /// No local state is touched; outbound network calls may be made.
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Build the verifier selected in `config`
///
/// # Errors
///
/// Returns `IdentityError::Configuration` if an endpoint URL is unusable.
pub fn build_verifier(config: &GoogleConfig) -> Result<Arc<dyn IdentityVerifier>, IdentityError> {
    Ok(match config.verifier {
        VerifierKind::AuthorizationCode => Arc::new(GoogleCodeVerifier::new(config)?),
        VerifierKind::IdToken => Arc::new(GoogleIdTokenVerifier::new(config)?),
    })
}

/// Accept only identities whose email is present and provider-verified
pub(crate) fn require_verified_email(
    subject: String,
    email: Option<String>,
    email_verified: bool,
    name: Option<String>,
) -> Result<VerifiedIdentity, IdentityError> {
    let email = email
        .filter(|e| !e.trim().is_empty())
        .ok_or(IdentityError::UnverifiedEmail)?;
    if !email_verified {
        return Err(IdentityError::UnverifiedEmail);
    }

    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    Ok(VerifiedIdentity {
        subject,
        email,
        email_verified,
        name,
    })
}
