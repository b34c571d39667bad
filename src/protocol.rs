use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error response returned by the API.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// Form body accepted by `/token`.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// Successful `/token` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// OpenAI-style chat completion request.
///
/// Only the fields the gateway inspects are typed; everything else is kept in
/// `extra` and forwarded to the engine untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_template: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    /// String or multi-part array content.
    #[serde(default)]
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Completed (non-streaming) chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default = "chat_completion_object")]
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Usage,
}

fn chat_completion_object() -> String {
    "chat.completion".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Engine-style error body the gateway writes itself, with `code` as the
/// HTTP status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineError {
    #[serde(default = "error_object")]
    pub object: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub param: Option<String>,
    pub code: u16,
}

fn error_object() -> String {
    "error".to_string()
}

impl EngineError {
    pub fn new(code: u16, kind: &str, message: impl Into<String>) -> Self {
        Self {
            object: error_object(),
            message: message.into(),
            kind: kind.to_string(),
            param: None,
            code,
        }
    }
}

/// `/v1/models` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelCard>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    pub permission: Vec<Value>,
}

impl ModelList {
    /// Listing for the configured public model name; empty when none is set.
    pub fn for_model(name: Option<&str>, owned_by: &str) -> Self {
        Self {
            object: "list".to_string(),
            data: name
                .map(|id| ModelCard {
                    id: id.to_string(),
                    object: "model".to_string(),
                    owned_by: owned_by.to_string(),
                    permission: Vec::new(),
                })
                .into_iter()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_keeps_unknown_fields() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "llama",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.2,
            "max_tokens": 16
        }))
        .unwrap();

        assert!(!req.stream);
        assert_eq!(req.extra["temperature"], json!(0.2));

        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back["max_tokens"], json!(16));
        assert!(back.get("chat_template").is_none());
    }

    #[test]
    fn test_engine_error_parses_vllm_shape() {
        let err: EngineError = serde_json::from_value(json!({
            "object": "error",
            "message": "max_tokens is too large",
            "type": "BadRequestError",
            "param": null,
            "code": 400
        }))
        .unwrap();
        assert_eq!(err.code, 400);
        assert_eq!(err.kind, "BadRequestError");
    }

    #[test]
    fn test_model_list_empty_without_name() {
        let list = serde_json::to_value(ModelList::for_model(None, "acme")).unwrap();
        assert_eq!(list, json!({"object": "list", "data": []}));
    }

    #[test]
    fn test_model_list_single_entry() {
        let list = serde_json::to_value(ModelList::for_model(Some("X"), "acme")).unwrap();
        assert_eq!(
            list,
            json!({
                "object": "list",
                "data": [{"id": "X", "object": "model", "owned_by": "acme", "permission": []}]
            })
        );
    }
}
