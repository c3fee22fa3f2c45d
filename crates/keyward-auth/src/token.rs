//! Access-token issuance and verification, refresh-credential generation
//!
//! Access tokens are HS256 JWTs carrying `sub` (user id), `iat`, `exp` and
//! `iss`. Verification checks the signature before any claim is looked at,
//! then the issuer, then expiry against the caller's `now`, then the subject.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::TokenError;

/// Entropy of a refresh credential in bytes (256 bits)
pub const REFRESH_CREDENTIAL_BYTES: usize = 32;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
    /// Issuer label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// A freshly signed access token
#[derive(Clone)]
pub struct IssuedAccessToken {
    /// Compact JWT
    pub token: String,
    /// Absolute expiry encoded in `exp`
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedAccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints and verifies access tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: TimeDelta,
    validation: Validation,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &ALGORITHM)
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Issuer signing with `secret`
    pub fn new(secret: &SecretString, issuer: impl Into<String>, access_ttl: TimeDelta) -> Self {
        let secret = secret.expose_secret().as_bytes();
        let issuer = issuer.into();

        // Expiry is checked by hand against the caller's clock, not the system clock
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer,
            access_ttl,
            validation,
        }
    }

    /// Issuer configured from an [`AuthConfig`]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.signing_secret(), config.issuer(), config.access_ttl_delta())
    }

    /// Configured access-token lifetime
    pub fn access_ttl(&self) -> TimeDelta {
        self.access_ttl
    }

    /// Sign an access token for `user_id`, valid from `now` for the access TTL
    ///
    /// # Errors
    ///
    /// Returns the `jsonwebtoken` error if encoding fails.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, jsonwebtoken::errors::Error> {
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: Some(self.issuer.clone()),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)?;
        Ok(IssuedAccessToken { token, expires_at })
    }

    /// Verify `token` at time `now` and return its user id
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidSignature`] if the signature does not match
    /// - [`TokenError::Expired`] if `exp` is at or before `now`
    /// - [`TokenError::Malformed`] for anything else (bad encoding, wrong
    ///   algorithm, missing claims, foreign issuer, non-UUID subject)
    pub fn verify_access_token(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            },
        )?;

        if data.claims.exp <= now.timestamp() {
            debug!(exp = data.claims.exp, "Access token expired");
            return Err(TokenError::Expired);
        }

        Uuid::parse_str(&data.claims.sub)
            .map_err(|e| TokenError::Malformed(format!("subject is not a user id: {e}")))
    }
}

/// Generate an unguessable refresh credential
///
/// 32 bytes from the thread-local CSPRNG, base64url without padding
/// (43 characters).
pub fn generate_refresh_credential() -> String {
    let mut bytes = [0u8; REFRESH_CREDENTIAL_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
