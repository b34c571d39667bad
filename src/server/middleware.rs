use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::auth::{AuthError, Principal, TokenService};

use super::handlers::write_error;

/// Verified principal stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

/// Auth middleware: extracts Bearer token, verifies it, injects `AuthUser` into extensions.
pub async fn auth_middleware(
    tokens: Arc<TokenService>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match bearer_token(&req) {
        Some(token) => token,
        None => return auth_error(&AuthError::MissingToken),
    };

    match tokens.verify(token) {
        Ok(principal) => {
            req.extensions_mut().insert(AuthUser(principal));
            next.run(req).await
        }
        Err(e) => {
            debug!(error = %e, "token rejected");
            auth_error(&e)
        }
    }
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    let header = req.headers().get("authorization")?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Map an auth failure to its response. Details of malformed tokens stay in the logs.
pub fn auth_error(err: &AuthError) -> Response {
    match err {
        AuthError::InvalidCredentials | AuthError::ExpiredToken => {
            write_error(StatusCode::UNAUTHORIZED, &err.to_string())
        }
        AuthError::MissingToken | AuthError::Forbidden { .. } => {
            write_error(StatusCode::FORBIDDEN, &err.to_string())
        }
        AuthError::InvalidToken(_) => {
            write_error(StatusCode::FORBIDDEN, "Could not validate credentials")
        }
        AuthError::Signing(_) => {
            write_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}
