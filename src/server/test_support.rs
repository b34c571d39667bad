//! In-memory adapter for dispatcher and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{AdapterFault, AdapterReply, FragmentStream, InferenceAdapter, ModelConfig};
use crate::protocol::{ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Usage};

pub const ENGINE_MODEL: &str = "meta-llama/Llama-3-8B-Instruct";

type ReplyFn =
    Box<dyn Fn(ChatCompletionRequest) -> Result<AdapterReply, AdapterFault> + Send + Sync>;

/// Adapter that answers every request with a scripted reply and counts calls.
pub struct ScriptedAdapter {
    pub describe_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    describe_delay: Duration,
    describe_failures: AtomicUsize,
    reply: ReplyFn,
    last_request: Mutex<Option<ChatCompletionRequest>>,
}

impl ScriptedAdapter {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(ChatCompletionRequest) -> Result<AdapterReply, AdapterFault> + Send + Sync + 'static,
    {
        Self {
            describe_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
            describe_delay: Duration::ZERO,
            describe_failures: AtomicUsize::new(0),
            reply: Box::new(reply),
            last_request: Mutex::new(None),
        }
    }

    /// Slow down `describe_model` so concurrent callers pile up on it.
    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = delay;
        self
    }

    /// Fail the first `times` calls to `describe_model`.
    pub fn failing_describe(self, times: usize) -> Self {
        self.describe_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn last_request(&self) -> Option<ChatCompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn describe_model(&self) -> Result<ModelConfig, AdapterFault> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.describe_delay.is_zero() {
            tokio::time::sleep(self.describe_delay).await;
        }
        let failing = self
            .describe_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AdapterFault::Unavailable("engine still loading".into()));
        }
        Ok(ModelConfig {
            model: ENGINE_MODEL.to_string(),
            max_model_len: Some(4096),
        })
    }

    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<AdapterReply, AdapterFault> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        (self.reply)(request)
    }
}

/// A completed result with `choices` choices and `(prompt, completion, total)` usage.
pub fn completion(choices: u32, usage: (u64, u64, u64)) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "chatcmpl-test".to_string(),
        object: "chat.completion".to_string(),
        created: 1_700_000_000,
        model: ENGINE_MODEL.to_string(),
        choices: (0..choices)
            .map(|index| ChatChoice {
                index,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: format!("answer {index}").into(),
                    ..Default::default()
                },
                finish_reason: Some("stop".to_string()),
            })
            .collect(),
        usage: Usage {
            prompt_tokens: usage.0,
            completion_tokens: usage.1,
            total_tokens: usage.2,
        },
    }
}

/// A finished stream yielding `items` in order.
pub fn fragments(items: &[&str]) -> FragmentStream {
    let items: Vec<Result<String, AdapterFault>> =
        items.iter().map(|s| Ok(s.to_string())).collect();
    Box::pin(futures_util::stream::iter(items))
}
