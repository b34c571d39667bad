mod adapter;
mod auth;
mod config;
mod protocol;
mod server;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use adapter::{InferenceAdapter, OpenAiEngine, OpenAiEngineConfig};
use auth::{CredentialStore, PasswordHasher, TokenService, TokenServiceConfig};
use config::{parse_list, Command, Config, DEFAULT_JWT_KEY};
use server::dispatch::{BindingSettings, GatewayDispatcher};
use server::handlers::AppState;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Some(Command::HashPassword { password }) = &config.command {
        println!("{}", PasswordHasher::new(config.jwt_key.as_str()).hash(password));
        return;
    }

    // Configure logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    if config.jwt_key == DEFAULT_JWT_KEY {
        warn!("JWT_KEY is not set - tokens and password hashes use the built-in default key");
    }
    if config.skip_exp_check {
        warn!("SKIP_EXP_CHECK enabled - expired tokens will be accepted");
    }

    // Token service
    let tokens = match TokenService::new(TokenServiceConfig {
        secret: config.jwt_key.clone(),
        algorithm: config.jwt_algorithm.clone(),
        default_ttl: config.access_token_ttl(),
        skip_exp_check: config.skip_exp_check,
    }) {
        Ok(t) => Arc::new(t),
        Err(e) => {
            error!(error = %e, "invalid token configuration");
            std::process::exit(1);
        }
    };

    // Users
    let aliases = parse_list(&config.user_list);
    let credentials = Arc::new(CredentialStore::from_env(&aliases));
    if credentials.is_empty() {
        warn!("no users configured - every login will be rejected");
    }
    info!(
        aliases = aliases.len(),
        users = credentials.len(),
        "loaded credentials"
    );

    // HTTP client for the engine. No overall timeout: generations may run long.
    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to build HTTP client");
            std::process::exit(1);
        });

    let engine = match OpenAiEngine::new(
        OpenAiEngineConfig {
            base_url: config.engine_url.clone(),
            api_key: config.engine_api_key.clone(),
        },
        http_client,
    ) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            error!(error = %e, "invalid engine configuration");
            std::process::exit(1);
        }
    };

    info!(
        adapter = engine.name(),
        base_url = engine.base_url(),
        "using inference engine"
    );

    let dispatcher = Arc::new(GatewayDispatcher::new(
        engine,
        BindingSettings {
            model_name: config.model_name.clone().filter(|n| !n.is_empty()),
            served_model_names: config
                .served_model_name
                .as_deref()
                .map(parse_list)
                .unwrap_or_default(),
            response_role: config.response_role.clone(),
            chat_template: config.chat_template.clone(),
        },
    ));

    let app = server::build_router(
        AppState {
            dispatcher,
            tokens,
            credentials,
            hasher: PasswordHasher::new(config.jwt_key.as_str()),
            owned_by: config.owned_by.clone(),
        },
        &parse_list(&config.cors_origins),
    );

    let addr = normalize_addr(&config.addr);
    let listener = TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        error!(addr = addr, error = %e, "failed to bind");
        std::process::exit(1);
    });

    info!(addr = addr, "server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "server error");
            std::process::exit(1);
        });

    info!("server stopped");
}

/// Convert ":8000" to "0.0.0.0:8000".
fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
