//! Bearer authentication for protected routes
//!
//! Checks the access token's signature, expiry and subject without touching
//! the user directory, then hands the user id to the handler through
//! [`AuthenticatedUser`] in the request extensions.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// User id of the bearer, set by [`require_bearer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

/// Token from an `Authorization: Bearer <token>` header
///
/// The scheme is matched case-insensitively. Returns `None` for a missing
/// header, another scheme, or an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Reject requests without a valid access token
///
/// # Errors
///
/// [`ApiError::MissingBearer`] without a bearer header, or the orchestrator's
/// `TokenExpired` / `InvalidAccessToken` for a bad token (all 401).
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = {
        let token = bearer_token(request.headers()).ok_or(ApiError::MissingBearer)?;
        state.auth.authenticate(token)?
    };

    debug!(user_id = %user_id, "Bearer authenticated");
    request.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(request).await)
}
