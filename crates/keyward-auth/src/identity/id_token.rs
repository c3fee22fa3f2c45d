//! Google ID-token verifier

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{GOOGLE_PROVIDER, IdentityVerifier, require_verified_email};
use crate::config::GoogleConfig;
use crate::error::IdentityError;
use crate::jwt::{JwksClient, JwtValidator};
use crate::types::VerifiedIdentity;

/// `email_verified` is a boolean in current tokens and a string in some older ones
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn is_true(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleIdClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<Flag>,
    #[serde(default)]
    name: Option<String>,
}

/// Verifies Google ID tokens against Google's published keys
#[derive(Debug, Clone)]
pub struct GoogleIdTokenVerifier {
    validator: Arc<JwtValidator>,
}

impl GoogleIdTokenVerifier {
    /// Verifier expecting `aud == client_id` and one of the configured issuers
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Configuration` if the JWKS URL is not HTTPS.
    pub fn new(config: &GoogleConfig) -> Result<Self, IdentityError> {
        let jwks = Arc::new(JwksClient::new(config.jwks_url.clone())?);
        let validator = JwtValidator::new(config.issuers.clone(), config.client_id.clone(), jwks)
            .with_clock_skew(config.id_token_leeway);
        Ok(Self {
            validator: Arc::new(validator),
        })
    }

    /// Use a preconfigured validator
    pub fn with_validator(validator: Arc<JwtValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdTokenVerifier {
    fn provider(&self) -> &'static str {
        GOOGLE_PROVIDER
    }

    fn credential_param(&self) -> &'static str {
        "id_token"
    }

    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, IdentityError> {
        let result = self
            .validator
            .validate::<GoogleIdClaims>(credential)
            .await
            .inspect_err(|e| warn!(error = %e, "Google ID token rejected"))?;

        debug!(subject = %result.claims.sub, key_id = %result.key_id, "Google ID token verified");

        let claims = result.claims;
        let verified = claims.email_verified.as_ref().is_some_and(Flag::is_true);
        require_verified_email(claims.sub, claims.email, verified, claims.name)
    }
}
