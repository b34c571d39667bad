use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingToken,

    /// Unknown user and wrong password share this variant so the two can't be told apart.
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("Required role: {required}, but got: {actual}")]
    Forbidden { required: String, actual: String },

    #[error("failed to sign token: {0}")]
    Signing(String),
}
