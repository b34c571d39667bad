pub mod dispatch;
pub mod handlers;
pub mod logging;
pub mod middleware;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::TokenService;

use self::handlers::AppState;

/// Build the axum router with public and protected route split.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let tokens = state.tokens.clone();
    let state = Arc::new(state);

    // Public routes (no auth)
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/token", post(handlers::token));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route("/v1/models", get(handlers::models))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route(
            "/v1/tasks/auto/completions",
            post(handlers::auto_completions),
        )
        .layer(axum_middleware::from_fn_with_state(
            tokens,
            |state: axum::extract::State<Arc<TokenService>>,
             req: axum::extract::Request,
             next: axum_middleware::Next| { middleware::auth_middleware(state.0, req, next) },
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(build_cors_layer(cors_origins))
        .layer(axum_middleware::from_fn(logging::logging_middleware))
        .with_state(state)
}

/// Build CORS layer; an empty list or "*" allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(allowed)
    }
}
