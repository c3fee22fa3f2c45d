//! Records and value types shared by the orchestrator and its collaborators

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token type label carried in every [`AuthToken`]
pub const BEARER: &str = "Bearer";

/// A locally provisioned user
///
/// Created lazily on the first successful federated login for an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct User {
    /// Opaque unique id
    pub id: Uuid,
    /// Unique, case-sensitive as stored
    pub email: String,
    /// Display name from the provider
    pub name: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New user with a fresh id, stamped at `now`
    pub fn new(email: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A server-side session bound to a refresh credential
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Session {
    /// Opaque unique id
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Refresh credential, unique across all sessions
    pub refresh_token: String,
    /// Absolute expiry; the session is valid while `now < expires_at`
    pub expires_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// New session with a fresh id, stamped at `now`
    pub fn new(
        user_id: Uuid,
        refresh_token: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            refresh_token,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once `now` has reached the expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// Refresh credentials must not end up in logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Credential bundle returned by login, refresh and validate
///
/// Never persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Signed access credential
    pub access_token: String,
    /// Always `"Bearer"`
    pub token_type: String,
    /// Seconds until the access credential expires
    pub expires_in: i64,
    /// Refresh credential; present on login (and on rotating refresh)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute access-credential expiry
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Bearer bundle for a freshly minted access credential
    pub fn bearer(
        access_token: String,
        expires_in: i64,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            token_type: BEARER.to_string(),
            expires_in,
            refresh_token,
            expires_at,
        }
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity claim produced by an identity verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Provider's stable subject id
    pub subject: String,
    /// Email address
    pub email: String,
    /// Whether the provider verified the email
    pub email_verified: bool,
    /// Display name
    pub name: String,
}
