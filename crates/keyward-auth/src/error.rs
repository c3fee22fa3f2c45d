//! Error types for keyward-auth
//!
//! Errors are layered the same way the collaborators are:
//! - [`IdentityError`]: the provider trust boundary (Google)
//! - [`TokenError`]: access-token verification
//! - [`StoreError`]: session store / user directory
//! - [`AuthError`]: what the orchestrator reports upward, with the collaborator
//!   cause preserved as `source`

use thiserror::Error;
use uuid::Uuid;

/// Result type for orchestrator operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the auth orchestrator
///
/// Every variant is scoped to a single request; none of them is fatal to the
/// process.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AuthError {
    /// The identity provider rejected the credential, or could not be reached.
    ///
    /// Transport and verification failures share this variant.
    #[error("identity verification failed: {0}")]
    IdentityVerificationFailed(#[source] IdentityError),

    /// The refresh credential does not match any session
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// The session or access token has expired
    #[error("token has expired")]
    TokenExpired,

    /// The access token failed signature or format checks
    #[error("invalid access token: {0}")]
    InvalidAccessToken(#[source] TokenError),

    /// The user referenced by a session or token no longer exists
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    /// A session could not be persisted during login
    #[error("failed to create session: {0}")]
    SessionCreateFailed(#[source] StoreError),

    /// A session store or user directory operation failed
    #[error("{operation} failed: {source}")]
    Store {
        /// The collaborator operation that failed
        operation: &'static str,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// Signing a new access token failed
    #[error("failed to issue access token: {0}")]
    TokenIssue(#[source] jsonwebtoken::errors::Error),

    /// The caller cancelled the request
    #[error("operation cancelled")]
    Cancelled,

    /// A collaborator call exceeded the request deadline
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// The collaborator operation that timed out
        operation: &'static str,
        /// The configured deadline in milliseconds
        timeout_ms: u64,
    },
}

impl AuthError {
    /// Wrap a store error with the operation that produced it
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        Self::Store { operation, source }
    }

    /// True when the request should be rejected as unauthenticated (401)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::IdentityVerificationFailed(_)
                | Self::InvalidRefreshToken
                | Self::TokenExpired
                | Self::InvalidAccessToken(_)
                | Self::UserNotFound(_)
        )
    }

    /// True for cancellation and deadline failures
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout { .. })
    }

    /// Stable machine-readable code for this error
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::IdentityVerificationFailed(_) => "identity_verification_failed",
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::TokenExpired => "token_expired",
            Self::InvalidAccessToken(_) => "invalid_token",
            Self::UserNotFound(_) => "user_not_found",
            Self::SessionCreateFailed(_) => "session_create_failed",
            Self::Store { .. } => "session_store_failure",
            Self::TokenIssue(_) => "token_issue_failed",
            Self::Cancelled => "cancelled",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Failures at the identity-provider boundary
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IdentityError {
    /// The provider endpoint could not be reached or returned a transport error
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status
    #[error("provider returned status {status} from {endpoint}")]
    Status {
        /// Endpoint that failed
        endpoint: &'static str,
        /// HTTP status code
        status: u16,
    },

    /// The authorization code could not be exchanged
    #[error("code exchange failed: {0}")]
    CodeExchange(String),

    /// The provider response could not be decoded
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The ID token failed signature or claim validation
    #[error("ID token rejected: {0}")]
    InvalidIdToken(String),

    /// The identity has no email, or the provider has not verified it
    #[error("email missing or not verified by provider")]
    UnverifiedEmail,

    /// Verifier configuration is unusable (bad URL etc.)
    #[error("verifier misconfigured: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Access-token verification failures, reported distinctly so callers can
/// choose retry vs. reject
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Signature does not match the signing secret
    #[error("signature is invalid")]
    InvalidSignature,

    /// Encoded expiry is at or before the check time
    #[error("token expired")]
    Expired,

    /// The token is not a well-formed JWT, or its claims are unusable
    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Session store / user directory failures
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// No record matched the lookup
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {constraint}")]
    Conflict {
        /// Name of the violated constraint (e.g. `users_email_key`)
        constraint: String,
    },

    /// The backing store failed
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a conflict error for the named constraint
    pub fn conflict(constraint: impl Into<String>) -> Self {
        Self::Conflict {
            constraint: constraint.into(),
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict {
                constraint: db.constraint().unwrap_or("unique").to_string(),
            },
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Configuration validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required value is missing
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    /// A value is present but unusable
    #[error("invalid configuration value for {key}: {message}")]
    Invalid {
        /// Configuration key
        key: &'static str,
        /// Why it was rejected
        message: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error
    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_classification() {
        assert!(AuthError::InvalidRefreshToken.is_unauthorized());
        assert!(AuthError::TokenExpired.is_unauthorized());
        assert!(AuthError::UserNotFound(Uuid::new_v4()).is_unauthorized());
        assert!(AuthError::InvalidAccessToken(TokenError::InvalidSignature).is_unauthorized());
        assert!(!AuthError::SessionCreateFailed(StoreError::backend("down")).is_unauthorized());
        assert!(!AuthError::Cancelled.is_unauthorized());
    }

    #[test]
    fn test_cancellation_classification() {
        assert!(AuthError::Cancelled.is_cancellation());
        assert!(
            AuthError::Timeout {
                operation: "session_store.create",
                timeout_ms: 10
            }
            .is_cancellation()
        );
        assert!(!AuthError::TokenExpired.is_cancellation());
    }

    #[test]
    fn test_cause_is_preserved() {
        use std::error::Error as _;

        let err = AuthError::store("user_directory.find_by_id", StoreError::backend("pool closed"));
        let source = err.source().expect("source should be set");
        assert!(source.to_string().contains("pool closed"));
        assert_eq!(err.code(), "session_store_failure");
    }
}
