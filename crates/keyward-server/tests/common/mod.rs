//! Shared fixtures for router tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use keyward_auth::{
    AuthConfig, AuthOrchestrator, GoogleConfig, IdentityError, IdentityVerifier, InMemoryStore,
    ManualClock, Session, SessionStore, StoreError, StoreResult, VerifiedIdentity,
};
use keyward_server::{AppState, router};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "router-test-secret-0123456789abcdef";

/// Verifier accepting a fixed set of authorization codes
#[derive(Debug, Default)]
pub struct ScriptedVerifier {
    identities: HashMap<String, VerifiedIdentity>,
}

impl ScriptedVerifier {
    pub fn with(mut self, code: &str, email: &str) -> Self {
        self.identities.insert(
            code.to_string(),
            VerifiedIdentity {
                subject: format!("google-{email}"),
                email: email.to_string(),
                email_verified: true,
                name: email.split('@').next().unwrap_or_default().to_string(),
            },
        );
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
        self.identities
            .get(credential)
            .cloned()
            .ok_or_else(|| IdentityError::CodeExchange("invalid_grant".to_string()))
    }
}

/// In-memory session store whose writes can be made to fail or hang
#[derive(Debug, Default)]
pub struct UnreliableSessions {
    inner: InMemoryStore,
    failing: AtomicBool,
    hanging: AtomicBool,
}

impl UnreliableSessions {
    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn hang(&self, on: bool) {
        self.hanging.store(on, Ordering::SeqCst);
    }

    async fn check(&self) -> StoreResult<()> {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::backend("database is down"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for UnreliableSessions {
    async fn create_session(&self, session: Session) -> StoreResult<()> {
        self.check().await?;
        self.inner.create_session(session).await
    }

    async fn get_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Session> {
        self.check().await?;
        self.inner.get_by_refresh_token(refresh_token).await
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        self.check().await?;
        self.inner.delete_session(id).await
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        self.check().await?;
        self.inner.delete_all_for_user(user_id).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.check().await?;
        self.inner.delete_expired(now).await
    }

    async fn count_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        self.inner.count_for_user(user_id).await
    }
}

pub fn verifier() -> ScriptedVerifier {
    ScriptedVerifier::default()
        .with("code-ada", "ada@example.com")
        .with("code-bob", "bob@example.com")
}

fn config(call_timeout: Duration) -> AuthConfig {
    AuthConfig::builder(
        TEST_SECRET,
        GoogleConfig::new(
            "client.apps.googleusercontent.com",
            "client-secret",
            "http://localhost:8080/callback",
        ),
    )
    .call_timeout(Some(call_timeout))
    .build()
    .expect("valid test config")
}

/// Parsed response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn str(&self, field: &str) -> &str {
        self.body[field].as_str().unwrap_or_default()
    }
}

/// Router over a manual clock, in-memory users and an unreliable session store
pub struct TestApp {
    pub router: Router,
    pub auth: Arc<AuthOrchestrator>,
    pub users: Arc<InMemoryStore>,
    pub sessions: Arc<UnreliableSessions>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_call_timeout(Duration::from_secs(2))
    }

    pub fn with_call_timeout(call_timeout: Duration) -> Self {
        let users = Arc::new(InMemoryStore::new());
        let sessions = Arc::new(UnreliableSessions::default());
        let clock = Arc::new(ManualClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ));
        let auth = Arc::new(
            AuthOrchestrator::new(
                Arc::new(config(call_timeout)),
                Arc::new(verifier()),
                users.clone(),
                sessions.clone(),
            )
            .with_clock(clock.clone()),
        );
        let router = router(AppState::new(auth.clone()));

        Self {
            router,
            auth,
            users,
            sessions,
            clock,
        }
    }

    pub async fn post(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.send("POST", uri, bearer).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send("GET", uri, None).await
    }

    async fn send(&self, method: &str, uri: &str, bearer: Option<&str>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = request.body(Body::empty()).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Log in with `code` and return the JSON token
    pub async fn login(&self, code: &str) -> TestResponse {
        let response = self.post(&format!("/v1/auth/google?code={code}"), None).await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {:?}", response.body);
        response
    }
}
