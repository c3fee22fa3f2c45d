//! JWT validation against a JWKS
//!
//! - Algorithm allowlist (asymmetric only; `none` and HMAC are refused)
//! - `kid` lookup with one forced JWKS refresh on a miss
//! - Issuer (any of several), audience, expiry with clock-skew leeway

use super::JwksClient;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::IdentityError;

/// Validated token contents
#[derive(Debug, Clone)]
pub struct JwtValidationResult<C> {
    /// Decoded claims
    pub claims: C,
    /// Algorithm used for signing
    pub algorithm: Algorithm,
    /// Key ID (kid) from the JWT header
    pub key_id: String,
}

/// JWT validator for third-party issued tokens
#[derive(Debug)]
pub struct JwtValidator {
    expected_issuers: Vec<String>,
    expected_audience: String,
    jwks_client: Arc<JwksClient>,
    clock_skew_leeway: Duration,
    allowed_algorithms: Vec<Algorithm>,
}

impl JwtValidator {
    /// Validator accepting any of `expected_issuers` and exactly `expected_audience`
    ///
    /// Defaults: 60 seconds of clock skew, algorithms RS256, ES256 and PS256.
    pub fn new(
        expected_issuers: Vec<String>,
        expected_audience: impl Into<String>,
        jwks_client: Arc<JwksClient>,
    ) -> Self {
        Self {
            expected_issuers,
            expected_audience: expected_audience.into(),
            jwks_client,
            clock_skew_leeway: Duration::from_secs(60),
            allowed_algorithms: vec![Algorithm::RS256, Algorithm::ES256, Algorithm::PS256],
        }
    }

    /// Set custom clock skew tolerance
    pub fn with_clock_skew(mut self, leeway: Duration) -> Self {
        self.clock_skew_leeway = leeway;
        self
    }

    /// Validate `token` and decode its claims as `C`
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidIdToken` if the token is malformed, uses
    /// a disallowed algorithm, names an unknown key, fails signature
    /// verification, or has a wrong issuer/audience or stale expiry. JWKS
    /// fetch failures are passed through.
    pub async fn validate<C>(&self, token: &str) -> Result<JwtValidationResult<C>, IdentityError>
    where
        C: DeserializeOwned,
    {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode JWT header");
            IdentityError::InvalidIdToken(format!("invalid JWT format: {e}"))
        })?;

        if !self.allowed_algorithms.contains(&header.alg) {
            warn!(
                algorithm = ?header.alg,
                allowed = ?self.allowed_algorithms,
                "JWT algorithm not allowed"
            );
            return Err(IdentityError::InvalidIdToken(format!(
                "algorithm {:?} not allowed",
                header.alg
            )));
        }

        let key_id = header.kid.clone().ok_or_else(|| {
            warn!("JWT missing kid (key ID) in header");
            IdentityError::InvalidIdToken("JWT must include kid in header".to_string())
        })?;

        let decoding_key = self.get_decoding_key(&key_id).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.expected_audience]);
        validation.set_issuer(&self.expected_issuers);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.clock_skew_leeway.as_secs();

        let data = decode::<C>(token, &decoding_key, &validation).map_err(|e| {
            warn!(
                error = %e,
                audience = %self.expected_audience,
                "JWT validation failed"
            );
            IdentityError::InvalidIdToken(e.to_string())
        })?;

        debug!(key_id = %key_id, algorithm = ?header.alg, "JWT validation successful");

        Ok(JwtValidationResult {
            claims: data.claims,
            algorithm: header.alg,
            key_id,
        })
    }

    /// Decoding key for `key_id`, refreshing the JWKS once if it is unknown
    async fn get_decoding_key(&self, key_id: &str) -> Result<DecodingKey, IdentityError> {
        let jwks = self.jwks_client.get_jwks().await?;
        let jwks = if jwks.find(key_id).is_some() {
            jwks
        } else {
            debug!(key_id, "Key ID not cached, refreshing JWKS");
            self.jwks_client.refresh().await?
        };

        let jwk = jwks.find(key_id).ok_or_else(|| {
            error!(key_id, "Key ID not found in JWKS");
            IdentityError::InvalidIdToken(format!("key '{key_id}' not found in JWKS"))
        })?;

        DecodingKey::from_jwk(jwk).map_err(|e| {
            error!(key_id, error = %e, "Failed to create decoding key from JWK");
            IdentityError::MalformedResponse(format!("invalid JWK: {e}"))
        })
    }

    /// Accepted issuers
    pub fn expected_issuers(&self) -> &[String] {
        &self.expected_issuers
    }

    /// Required audience
    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }
}
