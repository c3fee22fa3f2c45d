//! Immutable configuration for the auth orchestrator
//!
//! Built once at startup through [`AuthConfigBuilder`] and shared by `Arc`.
//! Nothing in this crate reads the environment; the binary does that and
//! hands the result here.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// Google OAuth 2.0 authorization endpoint
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google OAuth 2.0 token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Google OpenID Connect userinfo endpoint
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
/// Google signing keys for ID tokens
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
/// Issuer values Google places in ID tokens
pub const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Minimum signing secret length in bytes (HS256 key size)
pub const MIN_SECRET_LEN: usize = 32;

const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_ID_TOKEN_LEEWAY: Duration = Duration::from_secs(60);
const MAX_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Which provider credential the login endpoint accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifierKind {
    /// OAuth 2.0 authorization code, exchanged server-side
    #[default]
    AuthorizationCode,
    /// OpenID Connect ID token, verified against Google's JWKS
    IdToken,
}

impl VerifierKind {
    /// Canonical name used in configuration
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::IdToken => "id_token",
        }
    }
}

impl fmt::Display for VerifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerifierKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authorization_code" | "code" => Ok(Self::AuthorizationCode),
            "id_token" | "idtoken" => Ok(Self::IdToken),
            other => Err(ConfigError::invalid(
                "verifier",
                format!("unknown verifier '{other}' (expected authorization_code or id_token)"),
            )),
        }
    }
}

/// Google client registration and endpoint overrides
#[derive(Debug)]
pub struct GoogleConfig {
    /// OAuth client id; also the expected ID-token audience
    pub client_id: String,
    /// OAuth client secret (unused by the ID-token verifier)
    pub client_secret: SecretString,
    /// Redirect URL registered with Google
    pub redirect_url: String,
    /// Selected verifier variant
    pub verifier: VerifierKind,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Userinfo endpoint
    pub userinfo_url: String,
    /// JWKS endpoint
    pub jwks_url: String,
    /// Accepted `iss` values
    pub issuers: Vec<String>,
    /// Clock skew tolerated on ID-token `exp`
    pub id_token_leeway: Duration,
}

impl GoogleConfig {
    /// Google production endpoints with the given client registration
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_url: redirect_url.into(),
            verifier: VerifierKind::default(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            issuers: GOOGLE_ISSUERS.iter().map(|s| (*s).to_string()).collect(),
            id_token_leeway: DEFAULT_ID_TOKEN_LEEWAY,
        }
    }

    /// Select the verifier variant
    pub fn with_verifier(mut self, verifier: VerifierKind) -> Self {
        self.verifier = verifier;
        self
    }

    /// Point every endpoint at `base` (mock servers in tests)
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.auth_url = format!("{base}/o/oauth2/v2/auth");
        self.token_url = format!("{base}/token");
        self.userinfo_url = format!("{base}/v1/userinfo");
        self.jwks_url = format!("{base}/oauth2/v3/certs");
        self
    }

    /// Override the token endpoint
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Override the userinfo endpoint
    pub fn with_userinfo_url(mut self, url: impl Into<String>) -> Self {
        self.userinfo_url = url.into();
        self
    }

    /// Override the JWKS endpoint
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    /// Replace the accepted issuers
    pub fn with_issuers(mut self, issuers: Vec<String>) -> Self {
        self.issuers = issuers;
        self
    }

    /// Clock skew tolerated when checking ID-token expiry
    pub fn with_id_token_leeway(mut self, leeway: Duration) -> Self {
        self.id_token_leeway = leeway;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("google.client_id"));
        }
        if self.verifier == VerifierKind::AuthorizationCode {
            if self.client_secret.expose_secret().is_empty() {
                return Err(ConfigError::Missing("google.client_secret"));
            }
            url::Url::parse(&self.redirect_url)
                .map_err(|e| ConfigError::invalid("google.redirect_url", e.to_string()))?;
        }
        for (key, value) in [
            ("google.auth_url", &self.auth_url),
            ("google.token_url", &self.token_url),
            ("google.userinfo_url", &self.userinfo_url),
            ("google.jwks_url", &self.jwks_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
        }
        if self.issuers.is_empty() {
            return Err(ConfigError::Missing("google.issuers"));
        }
        Ok(())
    }
}

/// Orchestrator configuration
///
/// Read-only after construction. Share it with `Arc<AuthConfig>`.
#[derive(Debug)]
pub struct AuthConfig {
    signing_secret: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: String,
    call_timeout: Option<Duration>,
    rotate_refresh_tokens: bool,
    google: GoogleConfig,
}

impl AuthConfig {
    /// Start building a configuration
    pub fn builder(signing_secret: impl Into<String>, google: GoogleConfig) -> AuthConfigBuilder {
        AuthConfigBuilder {
            signing_secret: SecretString::from(signing_secret.into()),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            issuer: "keyward".to_string(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            rotate_refresh_tokens: false,
            google,
        }
    }

    /// HMAC signing secret for access tokens
    pub fn signing_secret(&self) -> &SecretString {
        &self.signing_secret
    }

    /// Access-token lifetime
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Session (refresh credential) lifetime
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// `iss` claim placed in access tokens
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Deadline applied to each collaborator call, if any
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Whether refresh issues a new refresh credential and revokes the old one
    pub fn rotate_refresh_tokens(&self) -> bool {
        self.rotate_refresh_tokens
    }

    /// Google client registration
    pub fn google(&self) -> &GoogleConfig {
        &self.google
    }

    pub(crate) fn access_ttl_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.access_ttl.as_secs() as i64)
    }

    pub(crate) fn refresh_ttl_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.refresh_ttl.as_secs() as i64)
    }
}

/// Builder for [`AuthConfig`]
#[derive(Debug)]
pub struct AuthConfigBuilder {
    signing_secret: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: String,
    call_timeout: Option<Duration>,
    rotate_refresh_tokens: bool,
    google: GoogleConfig,
}

impl AuthConfigBuilder {
    /// Access-token lifetime (default 15 minutes)
    pub fn access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Session lifetime (default 7 days)
    pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// `iss` claim for access tokens (default `keyward`)
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Per-call collaborator deadline (default 10 seconds); `None` disables it
    pub fn call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Enable refresh-credential rotation (default off)
    pub fn rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    /// Validate and freeze the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the secret is shorter than [`MIN_SECRET_LEN`]
    /// bytes, a TTL is zero or longer than a year, or the Google settings are
    /// incomplete for the selected verifier.
    pub fn build(self) -> Result<AuthConfig, ConfigError> {
        let secret_len = self.signing_secret.expose_secret().len();
        if secret_len < MIN_SECRET_LEN {
            return Err(ConfigError::invalid(
                "signing_secret",
                format!("must be at least {MIN_SECRET_LEN} bytes, got {secret_len}"),
            ));
        }

        for (key, ttl) in [("access_ttl", self.access_ttl), ("refresh_ttl", self.refresh_ttl)] {
            if ttl.as_secs() == 0 {
                return Err(ConfigError::invalid(key, "must be at least one second"));
            }
            if ttl > MAX_TTL {
                return Err(ConfigError::invalid(key, "must not exceed one year"));
            }
        }

        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Missing("issuer"));
        }
        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::invalid("call_timeout", "must be non-zero"));
        }

        self.google.validate()?;

        Ok(AuthConfig {
            signing_secret: self.signing_secret,
            access_ttl: self.access_ttl,
            refresh_ttl: self.refresh_ttl,
            issuer: self.issuer,
            call_timeout: self.call_timeout,
            rotate_refresh_tokens: self.rotate_refresh_tokens,
            google: self.google,
        })
    }
}
