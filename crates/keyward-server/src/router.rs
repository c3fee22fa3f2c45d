//! Route table
//!
//! ```text
//! GET  /ping
//! POST /v1/auth/{provider}?<code|id_token>=...
//! POST /v1/auth/refresh?refresh_token=...
//! POST /v1/auth/validate        (Authorization: Bearer)
//! POST /v1/auth/logout          (Authorization: Bearer, middleware-checked)
//! ```

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::require_bearer;
use crate::state::AppState;

/// Requests carry credentials in the query string; bodies are not read
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route_layer(from_fn_with_state(state.clone(), require_bearer));

    let v1 = Router::new()
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/validate", post(handlers::validate))
        .route("/auth/{provider}", post(handlers::login))
        .merge(protected);

    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/v1", v1)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
