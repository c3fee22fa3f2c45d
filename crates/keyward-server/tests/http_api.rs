//! Router tests
//!
//! Tests cover:
//! - Status codes and bodies of every route
//! - `WWW-Authenticate` on 401s
//! - Store failures (500) and deadlines (503)

mod common;

use std::time::Duration;

use axum::http::{StatusCode, header};
use chrono::TimeDelta;
use common::TestApp;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_ping() {
    let app = TestApp::new();
    let response = app.get("/ping").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"message": "pong"}));
}

#[tokio::test]
async fn test_login_returns_token_pair() {
    let app = TestApp::new();
    let response = app.login("code-ada").await;

    assert_eq!(response.str("token_type"), "Bearer");
    assert_eq!(response.body["expires_in"], json!(900));
    assert_eq!(response.str("expires_at"), "2023-11-14T22:28:20Z");
    assert_eq!(response.str("refresh_token").len(), 43);
    assert!(!response.str("access_token").is_empty());
    assert_eq!(app.users.user_count(), 1);
}

#[tokio::test]
async fn test_login_rejections() {
    let app = TestApp::new();

    // GIVEN: no credential
    let response = app.post("/v1/auth/google", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.str("error"), "invalid_request");
    assert_eq!(response.str("error_description"), "code is required");

    // GIVEN: empty credential
    let response = app.post("/v1/auth/google?code=", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // GIVEN: a provider this deployment does not serve
    let response = app.post("/v1/auth/github?code=code-ada", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.str("error"), "unknown_provider");

    // GIVEN: a code Google rejects
    let response = app.post("/v1/auth/google?code=stolen", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.str("error"), "identity_verification_failed");
    assert!(response.headers.contains_key(header::WWW_AUTHENTICATE));

    assert_eq!(app.users.user_count(), 0);
}

#[tokio::test]
async fn test_refresh() {
    let app = TestApp::new();
    let login = app.login("code-ada").await;
    let refresh_token = login.str("refresh_token").to_string();

    app.clock.advance(TimeDelta::minutes(5));
    let response = app
        .post(&format!("/v1/auth/refresh?refresh_token={refresh_token}"), None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.str("token_type"), "Bearer");
    assert!(response.body.get("refresh_token").is_none());
    assert_ne!(response.str("access_token"), login.str("access_token"));
}

#[tokio::test]
async fn test_refresh_rejections() {
    let app = TestApp::new();
    let login = app.login("code-ada").await;

    let response = app.post("/v1/auth/refresh", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.str("error_description"), "refresh_token is required");

    let response = app.post("/v1/auth/refresh?refresh_token=guess", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.str("error"), "invalid_refresh_token");

    app.clock.advance(TimeDelta::days(8));
    let uri = format!("/v1/auth/refresh?refresh_token={}", login.str("refresh_token"));
    let response = app.post(&uri, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.str("error"), "token_expired");
}

#[tokio::test]
async fn test_validate() {
    let app = TestApp::new();
    let login = app.login("code-ada").await;

    let response = app
        .post("/v1/auth/validate", Some(login.str("access_token")))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.get("refresh_token").is_none());

    let response = app.post("/v1/auth/validate", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers[header::WWW_AUTHENTICATE], "Bearer");

    app.clock.advance(TimeDelta::minutes(15));
    let response = app
        .post("/v1/auth/validate", Some(login.str("access_token")))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers[header::WWW_AUTHENTICATE],
        r#"Bearer error="invalid_token""#
    );
}

#[tokio::test]
async fn test_logout_revokes_refresh() {
    // GIVEN: ada logged in twice and bob once
    let app = TestApp::new();
    let first = app.login("code-ada").await;
    let second = app.login("code-ada").await;
    let bob = app.login("code-bob").await;

    // WHEN
    let response = app
        .post("/v1/auth/logout", Some(first.str("access_token")))
        .await;

    // THEN: both of ada's sessions are gone, bob's remains
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"message": "Successfully logged out"}));
    for login in [&first, &second] {
        let uri = format!("/v1/auth/refresh?refresh_token={}", login.str("refresh_token"));
        assert_eq!(app.post(&uri, None).await.status, StatusCode::UNAUTHORIZED);
    }
    let uri = format!("/v1/auth/refresh?refresh_token={}", bob.str("refresh_token"));
    assert_eq!(app.post(&uri, None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_requires_bearer() {
    let app = TestApp::new();

    let response = app.post("/v1/auth/logout", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.str("error"), "unauthorized");

    let response = app.post("/v1/auth/logout", Some("not-a-jwt")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.str("error"), "invalid_token");
}

#[tokio::test]
async fn test_session_store_failure_is_500() {
    let app = TestApp::new();
    app.sessions.fail(true);

    let response = app.post("/v1/auth/google?code=code-ada", None).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.str("error"), "session_create_failed");
    assert_eq!(response.str("error_description"), "internal server error");
    assert!(!response.headers.contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn test_logout_store_failure_is_500() {
    let app = TestApp::new();
    let login = app.login("code-ada").await;
    app.sessions.fail(true);

    let response = app
        .post("/v1/auth/logout", Some(login.str("access_token")))
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_hung_store_is_503() {
    let app = TestApp::with_call_timeout(Duration::from_millis(50));
    let login = app.login("code-ada").await;
    app.sessions.hang(true);

    let uri = format!("/v1/auth/refresh?refresh_token={}", login.str("refresh_token"));
    let response = app.post(&uri, None).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.str("error"), "timeout");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new();
    assert_eq!(app.get("/v1/users").await.status, StatusCode::NOT_FOUND);
}
