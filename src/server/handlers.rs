use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use tracing::{info, warn};

use crate::auth::{require_role, CredentialStore, PasswordHasher, TokenService};
use crate::protocol::{
    ChatCompletionRequest, ErrorResponse, HealthResponse, ModelList, TokenRequest, TokenResponse,
};
use crate::server::dispatch::GatewayDispatcher;
use crate::server::middleware::{auth_error, AuthUser};

/// Role required on completion endpoints.
pub const ADMIN_ROLE: &str = "admin";

/// Shared application state.
pub struct AppState {
    pub dispatcher: Arc<GatewayDispatcher>,
    pub tokens: Arc<TokenService>,
    pub credentials: Arc<CredentialStore>,
    pub hasher: PasswordHasher,
    pub owned_by: String,
}

/// Health check handler.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: Some(state.dispatcher.adapter_name().to_string()),
    })
}

/// Token endpoint: exchanges username/password for a bearer token.
pub async fn token(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return write_error(rejection.status(), &rejection.body_text()),
    };

    let user = match state
        .credentials
        .authenticate(&state.hasher, &form.username, &form.password)
    {
        Ok(user) => user,
        Err(e) => {
            warn!("rejected login attempt");
            return auth_error(&e);
        }
    };

    match state
        .tokens
        .issue(&user.username, &user.role, state.tokens.default_ttl())
    {
        Ok(access_token) => {
            info!(user = %user.username, role = %user.role, "issued access token");
            Json(TokenResponse {
                access_token,
                token_type: "bearer".to_string(),
            })
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "failed to issue access token");
            auth_error(&e)
        }
    }
}

/// Models endpoint: any verified token, no role check.
pub async fn models(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Json<ModelList> {
    info!(user = %auth.0.subject, role = %auth.0.role, "/v1/models called");
    Json(ModelList::for_model(
        state.dispatcher.model_name(),
        &state.owned_by,
    ))
}

/// Chat completions endpoint: admin only, streaming or buffered.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    completion(&state, &auth, body, "/v1/chat/completions").await
}

/// Auto completions endpoint: same contract as chat completions.
pub async fn auto_completions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    completion(&state, &auth, body, "/v1/tasks/auto/completions").await
}

/// Role check first, then body validation, then dispatch.
async fn completion(
    state: &AppState,
    auth: &AuthUser,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
    route: &str,
) -> Response {
    if let Err(e) = require_role(&auth.0, ADMIN_ROLE) {
        warn!(user = %auth.0.subject, role = %auth.0.role, route, "role check failed");
        return auth_error(&e);
    }

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return write_error(rejection.status(), &rejection.body_text()),
    };

    info!(
        user = %auth.0.subject,
        role = %auth.0.role,
        route,
        stream = request.stream,
        "processing completion request"
    );

    state.dispatcher.dispatch(request).await
}

pub fn write_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
