//! Auth orchestrator
//!
//! Coordinates the identity verifier, user directory, session store and token
//! issuer to implement login, refresh, validate and logout. It owns no
//! persistent state and holds no lock across steps; concurrent first logins
//! for the same email are settled by the directory's uniqueness constraint
//! and a re-read.
//!
//! Every collaborator call is bounded by the request's [`CallContext`] and the
//! configured call timeout.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::context::CallContext;
use crate::error::{AuthError, AuthResult, StoreError, StoreResult, TokenError};
use crate::identity::IdentityVerifier;
use crate::store::{SessionStore, UserDirectory};
use crate::token::{TokenIssuer, generate_refresh_credential};
use crate::types::{AuthToken, Session, User, VerifiedIdentity};

/// The login / refresh / validate / logout state machine
#[derive(Debug, Clone)]
pub struct AuthOrchestrator {
    config: Arc<AuthConfig>,
    verifier: Arc<dyn IdentityVerifier>,
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenIssuer,
    clock: Arc<dyn Clock>,
}

impl AuthOrchestrator {
    /// Orchestrator over the given collaborators, reading the system clock
    pub fn new(
        config: Arc<AuthConfig>,
        verifier: Arc<dyn IdentityVerifier>,
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let tokens = TokenIssuer::from_config(&config);
        Self {
            config,
            verifier,
            users,
            sessions,
            tokens,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Identity verifier in use
    pub fn verifier(&self) -> &Arc<dyn IdentityVerifier> {
        &self.verifier
    }

    /// Time source in use
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Sign in with a provider credential
    ///
    /// Verifies the credential, finds or provisions the user, opens a session
    /// and returns an access token together with the session's refresh
    /// credential.
    ///
    /// # Errors
    ///
    /// - [`AuthError::IdentityVerificationFailed`] if the provider rejects the
    ///   credential or cannot be reached
    /// - [`AuthError::SessionCreateFailed`] if the session cannot be stored
    /// - [`AuthError::Store`] if the user directory fails
    /// - [`AuthError::Cancelled`] / [`AuthError::Timeout`]
    pub async fn login(&self, ctx: &CallContext, credential: &str) -> AuthResult<AuthToken> {
        let provider = self.verifier.provider();
        let identity = self
            .bounded(ctx, "identity.verify", self.verifier.verify(credential))
            .await?
            .map_err(|e| {
                warn!(provider, error = %e, "Identity verification failed");
                AuthError::IdentityVerificationFailed(e)
            })?;

        let user = self.find_or_provision(ctx, &identity).await?;

        let now = self.clock.now();
        let refresh_token = generate_refresh_credential();
        let session = Session::new(
            user.id,
            refresh_token.clone(),
            now + self.config.refresh_ttl_delta(),
            now,
        );
        let session_id = session.id;

        self.bounded(ctx, "session_store.create", self.sessions.create_session(session))
            .await?
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "Failed to create session");
                AuthError::SessionCreateFailed(e)
            })?;

        let token = self.mint(user.id, now, Some(refresh_token))?;
        info!(user_id = %user.id, session_id = %session_id, provider, "User logged in");
        Ok(token)
    }

    /// Exchange a refresh credential for a new access token
    ///
    /// The response carries no refresh credential unless rotation is enabled,
    /// in which case it carries the replacement and the presented credential
    /// stops working.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRefreshToken`] if no session holds the credential
    /// - [`AuthError::TokenExpired`] if the session has expired (it is left in
    ///   place for the reaper)
    /// - [`AuthError::UserNotFound`] if the session's user no longer exists
    /// - [`AuthError::Store`] / [`AuthError::Cancelled`] / [`AuthError::Timeout`]
    pub async fn refresh(&self, ctx: &CallContext, refresh_token: &str) -> AuthResult<AuthToken> {
        const LOOKUP: &str = "session_store.get_by_refresh_token";

        let session = match self
            .bounded(ctx, LOOKUP, self.sessions.get_by_refresh_token(refresh_token))
            .await?
        {
            Ok(session) => session,
            Err(StoreError::NotFound) => {
                warn!("Refresh attempted with unknown credential");
                return Err(AuthError::InvalidRefreshToken);
            }
            Err(e) => return Err(self.store_failure(LOOKUP, e)),
        };

        let now = self.clock.now();
        if session.is_expired(now) {
            warn!(session_id = %session.id, user_id = %session.user_id, "Refresh attempted on expired session");
            return Err(AuthError::TokenExpired);
        }

        let user = self.load_user(ctx, session.user_id).await?;

        let rotated = if self.config.rotate_refresh_tokens() {
            Some(self.rotate(ctx, &session, now).await?)
        } else {
            None
        };

        let token = self.mint(user.id, now, rotated)?;
        debug!(user_id = %user.id, session_id = %session.id, "Access token refreshed");
        Ok(token)
    }

    /// Verify an access token and issue a fresh one with a new expiry window
    ///
    /// The user is reloaded, so deleting a user invalidates their outstanding
    /// access tokens immediately. The session is not touched.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidAccessToken`] for bad signature or format
    /// - [`AuthError::TokenExpired`] if the token has expired
    /// - [`AuthError::UserNotFound`] if the subject no longer exists
    /// - [`AuthError::Store`] / [`AuthError::Cancelled`] / [`AuthError::Timeout`]
    pub async fn validate(&self, ctx: &CallContext, access_token: &str) -> AuthResult<AuthToken> {
        let now = self.clock.now();
        let user_id = self.verify_at(access_token, now)?;
        let user = self.load_user(ctx, user_id).await?;

        let token = self.mint(user.id, now, None)?;
        debug!(user_id = %user.id, "Access token validated and reissued");
        Ok(token)
    }

    /// Check an access token's signature, expiry and subject
    ///
    /// No collaborator is consulted; this is the bearer-middleware check.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidAccessToken`] or [`AuthError::TokenExpired`].
    pub fn authenticate(&self, access_token: &str) -> AuthResult<Uuid> {
        self.verify_at(access_token, self.clock.now())
    }

    /// Sign out everywhere: delete every session of `user_id`
    ///
    /// Idempotent. Returns the number of sessions removed.
    ///
    /// # Errors
    ///
    /// [`AuthError::Store`] / [`AuthError::Cancelled`] / [`AuthError::Timeout`].
    pub async fn logout(&self, ctx: &CallContext, user_id: Uuid) -> AuthResult<u64> {
        let revoked = self
            .store(
                ctx,
                "session_store.delete_all_for_user",
                self.sessions.delete_all_for_user(user_id),
            )
            .await?;
        info!(user_id = %user_id, revoked, "User logged out");
        Ok(revoked)
    }

    /// Delete a single session by id
    ///
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// [`AuthError::Store`] / [`AuthError::Cancelled`] / [`AuthError::Timeout`].
    pub async fn revoke_session(&self, ctx: &CallContext, session_id: Uuid) -> AuthResult<()> {
        let removed = self
            .store(
                ctx,
                "session_store.delete_session",
                self.sessions.delete_session(session_id),
            )
            .await?;
        info!(session_id = %session_id, removed, "Session revoked");
        Ok(())
    }

    async fn find_or_provision(
        &self,
        ctx: &CallContext,
        identity: &VerifiedIdentity,
    ) -> AuthResult<User> {
        const FIND: &str = "user_directory.find_by_email";
        const CREATE: &str = "user_directory.create";

        if let Some(user) = self
            .store(ctx, FIND, self.users.find_by_email(&identity.email))
            .await?
        {
            return Ok(user);
        }

        let candidate = User::new(&identity.email, &identity.name, self.clock.now());
        match self.bounded(ctx, CREATE, self.users.create(candidate)).await? {
            Ok(user) => {
                info!(user_id = %user.id, "Provisioned user on first login");
                Ok(user)
            }
            Err(StoreError::Conflict { constraint }) => {
                // Another login provisioned the same email first
                debug!(constraint = %constraint, "Provisioning conflict, re-reading user");
                self.store(ctx, FIND, self.users.find_by_email(&identity.email))
                    .await?
                    .ok_or_else(|| self.store_failure(FIND, StoreError::NotFound))
            }
            Err(e) => Err(self.store_failure(CREATE, e)),
        }
    }

    /// Swap `old` for a fresh session with the same absolute expiry
    ///
    /// The old session is deleted first and only the caller whose delete
    /// removed it goes on to mint a replacement; a concurrent replay of the
    /// same credential loses and is rejected.
    async fn rotate(&self, ctx: &CallContext, old: &Session, now: DateTime<Utc>) -> AuthResult<String> {
        let removed = self
            .store(ctx, "session_store.delete_session", self.sessions.delete_session(old.id))
            .await?;
        if !removed {
            warn!(session_id = %old.id, user_id = %old.user_id, "Refresh credential replayed during rotation");
            return Err(AuthError::InvalidRefreshToken);
        }

        let credential = generate_refresh_credential();
        let replacement = Session::new(old.user_id, credential.clone(), old.expires_at, now);
        let replacement_id = replacement.id;
        self.store(ctx, "session_store.create", self.sessions.create_session(replacement))
            .await?;

        debug!(old_session = %old.id, new_session = %replacement_id, "Refresh credential rotated");
        Ok(credential)
    }

    async fn load_user(&self, ctx: &CallContext, user_id: Uuid) -> AuthResult<User> {
        self.store(ctx, "user_directory.find_by_id", self.users.find_by_id(user_id))
            .await?
            .ok_or_else(|| {
                warn!(user_id = %user_id, "User referenced by credential no longer exists");
                AuthError::UserNotFound(user_id)
            })
    }

    fn verify_at(&self, access_token: &str, now: DateTime<Utc>) -> AuthResult<Uuid> {
        self.tokens
            .verify_access_token(access_token, now)
            .map_err(|e| match e {
                TokenError::Expired => AuthError::TokenExpired,
                other => {
                    warn!(error = %other, "Access token rejected");
                    AuthError::InvalidAccessToken(other)
                }
            })
    }

    fn mint(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        refresh_token: Option<String>,
    ) -> AuthResult<AuthToken> {
        let issued = self
            .tokens
            .issue_access_token(user_id, now)
            .map_err(AuthError::TokenIssue)?;

        Ok(AuthToken::bearer(
            issued.token,
            self.config.access_ttl().as_secs() as i64,
            refresh_token,
            issued.expires_at,
        ))
    }

    async fn bounded<F>(
        &self,
        ctx: &CallContext,
        operation: &'static str,
        fut: F,
    ) -> AuthResult<F::Output>
    where
        F: Future,
    {
        ctx.bounded(operation, self.config.call_timeout(), fut).await
    }

    async fn store<F, T>(&self, ctx: &CallContext, operation: &'static str, fut: F) -> AuthResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.bounded(ctx, operation, fut)
            .await?
            .map_err(|e| self.store_failure(operation, e))
    }

    fn store_failure(&self, operation: &'static str, e: StoreError) -> AuthError {
        error!(operation, error = %e, "Store operation failed");
        AuthError::store(operation, e)
    }
}
