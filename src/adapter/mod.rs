pub mod errors;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, EngineError};

pub use errors::AdapterFault;
pub use openai::{OpenAiEngine, OpenAiEngineConfig};

/// Incremental completion fragments, each one the `data` payload of a
/// single SSE event. Multi-line payloads are joined with `\n`.
///
/// Fragments are expected to be free of carriage returns; the SSE writer
/// drops any it finds. Dropping the stream abandons the generation.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, AdapterFault>> + Send>>;

/// What the engine reports about the model it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub model: String,
    pub max_model_len: Option<u64>,
}

/// Error chosen by the engine, forwarded with its status and body untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl From<EngineError> for EngineErrorReply {
    fn from(err: EngineError) -> Self {
        Self {
            status: err.code,
            content_type: Some("application/json".to_string()),
            body: serde_json::to_vec(&err).unwrap_or_default(),
        }
    }
}

/// Result of a chat completion call.
pub enum AdapterReply {
    Error(EngineErrorReply),
    /// `stream: true` requests.
    Stream(FragmentStream),
    Complete(ChatCompletionResponse),
}

/// Inference engine contract.
#[async_trait]
pub trait InferenceAdapter: Send + Sync {
    /// Human-readable name for this adapter.
    fn name(&self) -> &str;

    /// Describe the model the engine serves.
    async fn describe_model(&self) -> Result<ModelConfig, AdapterFault>;

    /// Submit a chat completion request.
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<AdapterReply, AdapterFault>;
}
