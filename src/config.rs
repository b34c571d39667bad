use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};

/// Default signing secret. Startup warns when it is still in use.
pub const DEFAULT_JWT_KEY: &str = "default_jwt_key";

/// vLLM Gateway: authenticated OpenAI-compatible front for an inference engine.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Listen address (e.g. ":8000" or "0.0.0.0:8000")
    #[arg(long, default_value = ":8000", env = "ADDR")]
    pub addr: String,

    /// Log format: "text" or "json"
    #[arg(long, default_value = "text", env = "LOG_FORMAT")]
    pub log_format: String,

    /// Shared secret used to sign tokens and salt password hashes
    #[arg(long, default_value = DEFAULT_JWT_KEY, env = "JWT_KEY", hide_env_values = true)]
    pub jwt_key: String,

    /// Token signing algorithm (HS256, HS384 or HS512)
    #[arg(long, default_value = "HS256", env = "JWT_ALGORITHM")]
    pub jwt_algorithm: String,

    /// Accept tokens regardless of their expiry time
    #[arg(
        long,
        default_value_t = false,
        env = "SKIP_EXP_CHECK",
        value_parser = BoolishValueParser::new()
    )]
    pub skip_exp_check: bool,

    /// Lifetime of issued tokens in minutes
    #[arg(long, default_value_t = 60, env = "ACCESS_TOKEN_EXPIRE_MINUTES")]
    pub access_token_expire_minutes: u64,

    /// Comma-separated user aliases; each alias reads <ALIAS>_USERNAME,
    /// <ALIAS>_HASHED_PASSWORD and <ALIAS>_ROLE from the environment
    #[arg(long, default_value = "", env = "USER_LIST")]
    pub user_list: String,

    /// Base URL of the OpenAI-compatible inference engine
    #[arg(long, default_value = "http://127.0.0.1:8001", env = "ENGINE_URL")]
    pub engine_url: String,

    /// API key sent to the inference engine
    #[arg(long, env = "ENGINE_API_KEY", hide_env_values = true)]
    pub engine_api_key: Option<String>,

    /// Public model name reported by /v1/models
    #[arg(long, env = "MODEL_NAME")]
    pub model_name: Option<String>,

    /// Comma-separated model aliases accepted on completion requests
    #[arg(long, env = "SERVED_MODEL_NAME")]
    pub served_model_name: Option<String>,

    /// Role assigned to generated messages that do not carry one
    #[arg(long, default_value = "assistant", env = "RESPONSE_ROLE")]
    pub response_role: String,

    /// Chat template forwarded to the engine when a request has none
    #[arg(long, env = "CHAT_TEMPLATE")]
    pub chat_template: Option<String>,

    /// owned_by value in model listings
    #[arg(long, default_value = "apiac.ru", env = "OWNED_BY")]
    pub owned_by: String,

    /// Comma-separated CORS origins ("*" allows any origin)
    #[arg(long, default_value = "*", env = "CORS_ORIGINS")]
    pub cors_origins: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the stored hash for a password, for use in <ALIAS>_HASHED_PASSWORD
    HashPassword {
        /// Plaintext password
        password: String,
    },
}

impl Config {
    /// Lifetime of issued access tokens. Saturates for absurdly large settings.
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expire_minutes.saturating_mul(60))
    }
}

/// Parse a comma-separated list, trimming whitespace and filtering empties.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
