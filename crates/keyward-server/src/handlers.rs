//! Route handlers

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::HeaderMap;
use keyward_auth::AuthToken;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthenticatedUser, bearer_token};
use crate::state::AppState;

/// `{"message": "..."}` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Query of `POST /auth/refresh`
#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// `GET /ping`
pub async fn ping() -> Json<MessageResponse> {
    MessageResponse::new("pong")
}

/// `POST /auth/{provider}?<credential_param>=...`
pub async fn login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<AuthToken>> {
    let verifier = state.auth.verifier();
    if provider != verifier.provider() {
        return Err(ApiError::UnknownProvider(provider));
    }

    let param = verifier.credential_param();
    let credential = non_empty(params.get(param)).ok_or(ApiError::MissingParameter(param))?;

    let token = state.auth.login(&state.call_context(), credential).await?;
    Ok(Json(token))
}

/// `POST /auth/refresh?refresh_token=...`
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
) -> ApiResult<Json<AuthToken>> {
    let refresh_token = non_empty(params.refresh_token.as_ref())
        .ok_or(ApiError::MissingParameter("refresh_token"))?;

    let token = state.auth.refresh(&state.call_context(), refresh_token).await?;
    Ok(Json(token))
}

/// `POST /auth/validate` with `Authorization: Bearer <access token>`
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<AuthToken>> {
    let access_token = bearer_token(&headers).ok_or(ApiError::MissingBearer)?;
    let token = state.auth.validate(&state.call_context(), access_token).await?;
    Ok(Json(token))
}

/// `POST /auth/logout`, behind [`require_bearer`](crate::middleware::require_bearer)
pub async fn logout(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> ApiResult<Json<MessageResponse>> {
    state.auth.logout(&state.call_context(), user_id).await?;
    Ok(MessageResponse::new("Successfully logged out"))
}
