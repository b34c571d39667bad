use thiserror::Error;

/// Unexpected adapter failures. Structured engine errors are not faults; they
/// come back as `AdapterReply::Error`.
#[derive(Debug, Error)]
pub enum AdapterFault {
    #[error("inference engine request failed: {0}")]
    Transport(String),

    #[error("invalid response from inference engine: {0}")]
    Decode(String),

    #[error("inference engine unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<reqwest::Error> for AdapterFault {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdapterFault::Decode(e.to_string())
        } else {
            AdapterFault::Transport(e.to_string())
        }
    }
}
