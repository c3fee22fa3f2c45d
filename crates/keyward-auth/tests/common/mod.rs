//! Common test utilities for integration tests
//!
//! Provides a wiremock-backed Google (token, userinfo, JWKS), an RSA key for
//! signing test ID tokens, a scripted verifier, and store doubles that fail
//! or stall on demand.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use keyward_auth::{
    AuthConfig, AuthOrchestrator, GoogleConfig, IdentityError, IdentityVerifier, InMemoryStore,
    ManualClock, Session, SessionStore, StoreError, StoreResult, User, UserDirectory,
    VerifiedIdentity, VerifierKind,
};
use serde_json::json;
use tokio::sync::Barrier;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_SECRET: &str = "test-signing-secret-0123456789abcdef";
pub const CLIENT_ID: &str = "test-client.apps.googleusercontent.com";
pub const TEST_KID: &str = "test-key-1";

const TEST_KEY_PEM: &str = include_str!("../fixtures/google_test_key.pem");
const TEST_KEY_N: &str = include_str!("../fixtures/google_test_key.n");

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn epoch(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Mock of Google's token, userinfo and JWKS endpoints
pub struct MockGoogle {
    pub server: MockServer,
}

impl MockGoogle {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Client registration pointed at this mock
    pub fn google_config(&self, verifier: VerifierKind) -> GoogleConfig {
        GoogleConfig::new(CLIENT_ID, "test-client-secret", "http://localhost:8080/callback")
            .with_base_url(&self.uri())
            .with_verifier(verifier)
    }

    /// Token endpoint accepts `code` and returns `access_token`
    pub async fn mock_token_success(&self, code: &str, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(wiremock::matchers::body_string_contains(format!("code={code}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": 3599,
                "scope": "openid email profile",
            })))
            .mount(&self.server)
            .await;
    }

    /// Token endpoint rejects everything with an OAuth error
    pub async fn mock_token_error(&self, error: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": error,
                "error_description": "Bad Request",
            })))
            .mount(&self.server)
            .await;
    }

    /// Userinfo endpoint answers `body` for requests bearing `access_token`
    pub async fn mock_userinfo(&self, access_token: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v1/userinfo"))
            .and(header("authorization", format!("Bearer {access_token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Userinfo endpoint fails with `status`
    pub async fn mock_userinfo_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/v1/userinfo"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// JWKS endpoint publishing the test key under `kid`
    pub async fn mock_jwks(&self, kid: &str) {
        Mock::given(method("GET"))
            .and(path("/oauth2/v3/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(kid)))
            .mount(&self.server)
            .await;
    }
}

pub fn jwks_body(kid: &str) -> serde_json::Value {
    json!({
        "keys": [{
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": kid,
            "n": TEST_KEY_N.trim(),
            "e": "AQAB",
        }]
    })
}

/// Google-shaped ID token claims, valid for an hour
pub fn google_claims(email: &str, email_verified: bool) -> serde_json::Value {
    let now = current_timestamp();
    json!({
        "iss": "https://accounts.google.com",
        "aud": CLIENT_ID,
        "sub": "110169484474386276334",
        "email": email,
        "email_verified": email_verified,
        "name": "Test User",
        "iat": now,
        "exp": now + 3600,
    })
}

/// Sign `claims` with the test RSA key
pub fn sign_id_token(claims: &serde_json::Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes()).expect("test key parses");
    jsonwebtoken::encode(&header, claims, &key).expect("test token signs")
}

/// Verifier that maps fixed credentials to identities
#[derive(Debug, Default)]
pub struct ScriptedVerifier {
    identities: HashMap<String, VerifiedIdentity>,
    delay: Option<Duration>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, credential: &str, email: &str, name: &str) -> Self {
        self.identities.insert(
            credential.to_string(),
            VerifiedIdentity {
                subject: format!("sub-{email}"),
                email: email.to_string(),
                email_verified: true,
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl IdentityVerifier for ScriptedVerifier {
    fn provider(&self) -> &'static str {
        "google"
    }

    fn credential_param(&self) -> &'static str {
        "code"
    }

    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, IdentityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.identities
            .get(credential)
            .cloned()
            .ok_or_else(|| IdentityError::CodeExchange("invalid_grant".to_string()))
    }
}

/// Session store that delegates to memory but can be told to fail or stall
#[derive(Debug, Default)]
pub struct FaultySessionStore {
    inner: InMemoryStore,
    fail_writes: AtomicBool,
    stall: AtomicBool,
}

impl FaultySessionStore {
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn stall(&self, on: bool) {
        self.stall.store(on, Ordering::SeqCst);
    }

    pub fn session_count(&self) -> usize {
        self.inner.session_count()
    }

    async fn gate(&self) -> StoreResult<()> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn write_gate(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FaultySessionStore {
    async fn create_session(&self, session: Session) -> StoreResult<()> {
        self.gate().await?;
        self.write_gate()?;
        self.inner.create_session(session).await
    }

    async fn get_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Session> {
        self.gate().await?;
        self.inner.get_by_refresh_token(refresh_token).await
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        self.gate().await?;
        self.write_gate()?;
        self.inner.delete_session(id).await
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        self.gate().await?;
        self.write_gate()?;
        self.inner.delete_all_for_user(user_id).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.gate().await?;
        self.write_gate()?;
        self.inner.delete_expired(now).await
    }

    async fn count_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        self.gate().await?;
        self.inner.count_for_user(user_id).await
    }
}

/// Session store that holds every credential lookup until `parties` lookups
/// are waiting, so concurrent refreshes all read before any of them writes
#[derive(Debug)]
pub struct LockstepSessions {
    pub inner: InMemoryStore,
    barrier: Barrier,
}

impl LockstepSessions {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl SessionStore for LockstepSessions {
    async fn create_session(&self, session: Session) -> StoreResult<()> {
        self.inner.create_session(session).await
    }

    async fn get_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Session> {
        let session = self.inner.get_by_refresh_token(refresh_token).await;
        self.barrier.wait().await;
        session
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_session(id).await
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        self.inner.delete_all_for_user(user_id).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.delete_expired(now).await
    }

    async fn count_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        self.inner.count_for_user(user_id).await
    }
}

/// User directory where another writer always provisions the email between
/// the first lookup and our insert
///
/// The first `find_by_email` misses, `create` stores `winner` instead of the
/// candidate and reports a uniqueness conflict.
#[derive(Debug)]
pub struct OutracedDirectory {
    pub inner: InMemoryStore,
    winner: User,
    pub email_lookups: AtomicUsize,
    pub creates: AtomicUsize,
}

impl OutracedDirectory {
    pub fn new(winner: User) -> Self {
        Self {
            inner: InMemoryStore::new(),
            winner,
            email_lookups: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UserDirectory for OutracedDirectory {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        if self.email_lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(None);
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, _user: User) -> StoreResult<User> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(self.winner.clone()).await?;
        Err(StoreError::conflict("users_email_key"))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete(id).await
    }
}

pub fn test_config(rotate: bool) -> AuthConfig {
    AuthConfig::builder(
        TEST_SECRET,
        GoogleConfig::new(CLIENT_ID, "test-client-secret", "http://localhost:8080/callback"),
    )
    .rotate_refresh_tokens(rotate)
    .call_timeout(Some(Duration::from_secs(2)))
    .build()
    .expect("valid test config")
}

/// Orchestrator over one in-memory store with a manual clock
pub struct Harness {
    pub auth: AuthOrchestrator,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(verifier: ScriptedVerifier) -> Self {
        Self::with_config(verifier, test_config(false))
    }

    pub fn with_config(verifier: ScriptedVerifier, config: AuthConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(epoch(1_700_000_000)));
        let auth = AuthOrchestrator::new(
            Arc::new(config),
            Arc::new(verifier),
            store.clone(),
            store.clone(),
        )
        .with_clock(clock.clone());
        Self { auth, store, clock }
    }
}
