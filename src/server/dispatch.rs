use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{future, FutureExt, StreamExt};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::adapter::{
    AdapterFault, AdapterReply, EngineErrorReply, FragmentStream, InferenceAdapter, ModelConfig,
};
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, EngineError};

use super::handlers::write_error;

/// Gateway-side serving settings joined with the engine at binding time.
#[derive(Debug, Clone, Default)]
pub struct BindingSettings {
    /// Public model name; also what `/v1/models` reports.
    pub model_name: Option<String>,
    /// Explicit aliases; take precedence over `model_name`.
    pub served_model_names: Vec<String>,
    pub response_role: String,
    pub chat_template: Option<String>,
}

/// The engine plus everything resolved from it on first use.
pub struct ServingBinding {
    adapter: Arc<dyn InferenceAdapter>,
    model_config: ModelConfig,
    served_names: Vec<String>,
    response_role: String,
    chat_template: Option<String>,
}

impl ServingBinding {
    fn new(
        adapter: Arc<dyn InferenceAdapter>,
        model_config: ModelConfig,
        settings: &BindingSettings,
    ) -> Self {
        let served_names = if !settings.served_model_names.is_empty() {
            settings.served_model_names.clone()
        } else if let Some(name) = &settings.model_name {
            vec![name.clone()]
        } else {
            vec![model_config.model.clone()]
        };

        Self {
            adapter,
            model_config,
            served_names,
            response_role: settings.response_role.clone(),
            chat_template: settings.chat_template.clone(),
        }
    }

    pub fn served_names(&self) -> &[String] {
        &self.served_names
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    /// Resolve the model alias and fill gateway defaults.
    ///
    /// Returns the request to forward and the model name to report back.
    fn prepare(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<(ChatCompletionRequest, String), EngineError> {
        let requested = request.model.trim().to_string();

        let public_name = if requested.is_empty() {
            self.served_names[0].clone()
        } else if self.served_names.contains(&requested) || requested == self.model_config.model
        {
            requested
        } else {
            return Err(EngineError::new(
                404,
                "NotFoundError",
                format!("The model `{requested}` does not exist."),
            ));
        };

        request.model = self.model_config.model.clone();
        if request.chat_template.is_none() {
            request.chat_template = self.chat_template.clone();
        }

        Ok((request, public_name))
    }

    /// Stamp the canonical completion shape onto an engine result.
    fn finalize(
        &self,
        mut completion: ChatCompletionResponse,
        public_name: String,
    ) -> ChatCompletionResponse {
        completion.object = "chat.completion".to_string();
        completion.model = public_name;
        for choice in &mut completion.choices {
            if choice.message.role.is_empty() {
                choice.message.role = self.response_role.clone();
            }
        }
        completion
    }

    /// Forward a chat completion request to the engine.
    pub async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<AdapterReply, AdapterFault> {
        let (request, public_name) = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(err) => return Ok(AdapterReply::Error(err.into())),
        };

        Ok(match self.adapter.create_chat_completion(request).await? {
            AdapterReply::Complete(completion) => {
                AdapterReply::Complete(self.finalize(completion, public_name))
            }
            other => other,
        })
    }
}

/// Owns the engine binding and turns adapter replies into HTTP responses.
pub struct GatewayDispatcher {
    adapter: Arc<dyn InferenceAdapter>,
    settings: BindingSettings,
    binding: OnceCell<ServingBinding>,
}

impl GatewayDispatcher {
    pub fn new(adapter: Arc<dyn InferenceAdapter>, settings: BindingSettings) -> Self {
        Self {
            adapter,
            settings,
            binding: OnceCell::new(),
        }
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Configured public model name, if any.
    pub fn model_name(&self) -> Option<&str> {
        self.settings.model_name.as_deref()
    }

    /// Get the serving binding, building it on first use.
    ///
    /// Concurrent first callers wait on a single construction. A failed
    /// construction leaves the cell empty so the next request retries.
    pub async fn binding(&self) -> Result<&ServingBinding, AdapterFault> {
        self.binding
            .get_or_try_init(|| async {
                info!(adapter = self.adapter.name(), "initializing serving binding");
                let model_config = self.adapter.describe_model().await.map_err(|e| {
                    error!(adapter = self.adapter.name(), error = %e, "failed to describe model");
                    e
                })?;
                let binding =
                    ServingBinding::new(self.adapter.clone(), model_config, &self.settings);
                info!(
                    model = %binding.model_config().model,
                    max_model_len = ?binding.model_config().max_model_len,
                    served_names = ?binding.served_names(),
                    "serving binding ready"
                );
                Ok::<_, AdapterFault>(binding)
            })
            .await
    }

    /// Run a chat completion and translate the outcome into a response.
    ///
    /// Faults and panics from the binding or the adapter become 500s here.
    pub async fn dispatch(&self, request: ChatCompletionRequest) -> Response {
        let streaming = request.stream;

        let outcome = AssertUnwindSafe(async {
            let binding = self.binding().await?;
            binding.create_chat_completion(request).await
        })
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(AdapterReply::Error(err))) => {
                error!(
                    status = err.status,
                    body = %String::from_utf8_lossy(&err.body),
                    "engine returned an error"
                );
                engine_error_response(err)
            }
            Ok(Ok(AdapterReply::Stream(stream))) if streaming => {
                debug!("returning streaming response");
                stream_response(stream)
            }
            Ok(Ok(AdapterReply::Complete(completion))) if !streaming => {
                debug!("returning JSON response");
                Json(completion).into_response()
            }
            Ok(Ok(_)) => internal_fault(if streaming {
                "engine returned a buffered reply to a streaming request"
            } else {
                "engine returned a stream to a non-streaming request"
            }),
            Ok(Err(fault)) => internal_fault(&fault.to_string()),
            Err(panic) => internal_fault(&panic_message(panic.as_ref())),
        }
    }
}

/// Write the engine's error back with its own status, content type and body.
fn engine_error_response(err: EngineErrorReply) -> Response {
    let status = StatusCode::from_u16(err.status)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (status, err.body).into_response();
    match err
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        Some(content_type) => {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        None => {
            response.headers_mut().remove(header::CONTENT_TYPE);
        }
    }
    response
}

/// Forward fragments as server-sent events, one event per fragment.
///
/// A mid-stream fault is reported as a final `error` event.
fn stream_response(stream: FragmentStream) -> Response {
    let events = stream.scan(false, |failed, fragment| {
        if *failed {
            return future::ready(None);
        }
        let event = match fragment {
            // SSE data lines cannot carry carriage returns.
            Ok(data) if data.contains('\r') => {
                debug!(len = data.len(), "dropping carriage returns from fragment");
                Event::default().data(data.replace('\r', ""))
            }
            Ok(data) => Event::default().data(data),
            Err(fault) => {
                *failed = true;
                warn!(error = %fault, "fragment stream failed");
                Event::default()
                    .event("error")
                    .data(json!({ "error": fault.to_string() }).to_string())
            }
        };
        future::ready(Some(Ok::<_, Infallible>(event)))
    });

    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(events),
    )
        .into_response()
}

fn internal_fault(message: &str) -> Response {
    error!(error = message, "chat completion failed");
    write_error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "internal error".to_string()
    }
}
