use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use url::Url;

use super::{
    AdapterFault, AdapterReply, EngineErrorReply, FragmentStream, InferenceAdapter, ModelConfig,
};
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse};

/// OpenAI-compatible engine configuration.
pub struct OpenAiEngineConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Adapter for an inference engine that speaks the OpenAI HTTP API
/// (e.g. a vLLM API server).
pub struct OpenAiEngine {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct EngineModelList {
    #[serde(default)]
    data: Vec<EngineModel>,
}

#[derive(Deserialize)]
struct EngineModel {
    id: String,
    #[serde(default)]
    max_model_len: Option<u64>,
}

impl OpenAiEngine {
    pub fn new(
        config: OpenAiEngineConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, AdapterFault> {
        // Fail at startup rather than on the first request.
        build_upstream_url(&config.base_url, "/v1/models")?;

        Ok(Self {
            base_url: config.base_url,
            api_key: config.api_key,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, AdapterFault> {
        let url = build_upstream_url(&self.base_url, path)?;
        let builder = self.http_client.request(method, url);
        Ok(match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        })
    }
}

#[async_trait]
impl InferenceAdapter for OpenAiEngine {
    fn name(&self) -> &str {
        "openai-engine"
    }

    async fn describe_model(&self) -> Result<ModelConfig, AdapterFault> {
        let resp = self
            .request(reqwest::Method::GET, "/v1/models")?
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AdapterFault::Unavailable(format!(
                "model listing returned status {}",
                resp.status()
            )));
        }

        let listing: EngineModelList = resp.json().await?;
        let model = listing
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AdapterFault::Unavailable("engine serves no models".into()))?;

        Ok(ModelConfig {
            model: model.id,
            max_model_len: model.max_model_len,
        })
    }

    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<AdapterReply, AdapterFault> {
        let streaming = request.stream;
        let mut builder = self
            .request(reqwest::Method::POST, "/v1/chat/completions")?
            .json(&request);
        if streaming {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }

        let resp = builder.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp.bytes().await?.to_vec();
            return Ok(AdapterReply::Error(EngineErrorReply {
                status: status.as_u16(),
                content_type,
                body,
            }));
        }

        if streaming {
            return Ok(AdapterReply::Stream(sse_fragments(resp.bytes_stream())));
        }

        let body = resp.bytes().await?;
        let completion: ChatCompletionResponse =
            serde_json::from_slice(&body).map_err(|e| AdapterFault::Decode(e.to_string()))?;
        Ok(AdapterReply::Complete(completion))
    }
}

/// Build the upstream URL from the engine base URL and an API path.
pub fn build_upstream_url(base_url: &str, path: &str) -> Result<String, AdapterFault> {
    let mut parsed = Url::parse(base_url)
        .map_err(|e| AdapterFault::Internal(format!("invalid engine URL {base_url}: {e}")))?;

    let normalized_base = parsed.path().trim_end_matches('/');
    let trimmed_path = path.trim_start_matches('/');

    let full_path = if normalized_base.is_empty() {
        format!("/{trimmed_path}")
    } else if trimmed_path.is_empty() {
        normalized_base.to_string()
    } else {
        format!("{normalized_base}/{trimmed_path}")
    };

    parsed.set_path(&full_path);
    parsed.set_query(None);

    Ok(parsed.to_string())
}

struct SseState<S> {
    inner: S,
    buffer: Vec<u8>,
    /// `data` lines of the event being assembled.
    data: Vec<String>,
    done: bool,
}

impl<S> SseState<S> {
    /// Pop the next complete event's payload out of the buffered lines.
    ///
    /// An event ends at a blank line; its `data` lines are joined with `\n`.
    /// Events without data (comments, keep-alives) are skipped.
    fn next_fragment(&mut self) -> Option<String> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    let lines = std::mem::take(&mut self.data);
                    return Some(lines.join("\n"));
                }
            } else if line == "data" {
                self.data.push(String::new());
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }
        None
    }
}

/// Turn an SSE byte stream into one payload per event, in order.
///
/// Pull-driven: nothing is read from the engine until the consumer asks for
/// the next fragment, and dropping the result drops the engine connection.
pub fn sse_fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<AdapterFault> + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(bytes),
        buffer: Vec::new(),
        data: Vec::new(),
        done: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.next_fragment() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    // Terminate a trailing line and event the engine left open.
                    state.done = true;
                    state.buffer.extend_from_slice(b"\n\n");
                }
            }
        }
    }))
}
