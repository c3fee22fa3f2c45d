//! HTTP error responses
//!
//! Every failure leaves the service as
//! `{"error": "<code>", "error_description": "<text>"}`. 401 responses carry
//! `WWW-Authenticate: Bearer` (RFC 6750). Server-side failures are logged in
//! full and answered with a generic description.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use keyward_auth::AuthError;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

/// Errors returned by handlers and middleware
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required query parameter absent or empty
    #[error("{0} is required")]
    MissingParameter(&'static str),

    /// Login route names a provider this deployment does not serve
    #[error("unknown identity provider '{0}'")]
    UnknownProvider(String),

    /// No usable `Authorization: Bearer` header
    #[error("valid bearer token required")]
    MissingBearer,

    /// Orchestrator failure
    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::UnknownProvider(_) => StatusCode::NOT_FOUND,
            Self::MissingBearer => StatusCode::UNAUTHORIZED,
            Self::Auth(e) if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
            Self::Auth(e) if e.is_cancellation() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "invalid_request",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::MissingBearer => "unauthorized",
            Self::Auth(e) => e.code(),
        }
    }

    fn challenge(&self) -> &'static str {
        match self {
            Self::Auth(_) => r#"Bearer error="invalid_token""#,
            _ => "Bearer",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let description = if status.is_server_error() {
            error!(error = %self, code = self.code(), status = status.as_u16(), "Request failed");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "service temporarily unavailable".to_string(),
                _ => "internal server error".to_string(),
            }
        } else {
            debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        let mut response = (
            status,
            Json(json!({
                "error": self.code(),
                "error_description": description,
            })),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(self.challenge()),
            );
        }

        response
    }
}
