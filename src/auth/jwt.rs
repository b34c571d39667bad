use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// JWT claims.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

/// Identity recovered from a verified token. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: String,
}

/// Token service configuration.
pub struct TokenServiceConfig {
    pub secret: String,
    pub algorithm: String,
    pub default_ttl: Duration,
    pub skip_exp_check: bool,
}

/// Issues and verifies HMAC-signed JWTs. Stateless: there is no revocation list.
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: Duration,
    skip_exp_check: bool,
}

impl TokenService {
    /// Create a token service. Only the HMAC family is accepted.
    pub fn new(config: TokenServiceConfig) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(config.algorithm.trim())
            .map_err(|e| AuthError::Signing(format!("{}: {e}", config.algorithm)))?;

        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Signing(format!(
                "unsupported signing algorithm: {algorithm:?}"
            )));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            default_ttl: config.default_ttl,
            skip_exp_check: config.skip_exp_check,
        })
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token for `subject` with `role`, valid for `ttl`.
    pub fn issue(&self, subject: &str, role: &str, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub: Some(subject.to_string()),
            role: Some(role.to_string()),
            exp: Some(now_secs().saturating_add(ttl.as_secs())),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify signature and (unless disabled) expiry, and return the principal.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        if self.skip_exp_check {
            validation.validate_exp = false;
            validation.set_required_spec_claims::<&str>(&[]);
        } else {
            validation.set_required_spec_claims::<&str>(&["exp"]);
        }

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                if e.kind() == &jsonwebtoken::errors::ErrorKind::ExpiredSignature {
                    AuthError::ExpiredToken
                } else {
                    AuthError::InvalidToken(e.to_string())
                }
            })?;

        let claims = token_data.claims;

        let subject = claims
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("missing subject claim".into()))?;

        Ok(Principal {
            subject,
            role: claims.role.unwrap_or_default(),
        })
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
