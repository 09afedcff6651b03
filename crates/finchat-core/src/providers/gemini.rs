//! Gemini provider (`streamGenerateContent`, SSE).

use std::collections::VecDeque;
use std::pin::Pin;

use anyhow::Result;
use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::providers::debug_trace::{DebugTrace, wrap_stream};
use crate::providers::shared::{
    ChatMessage, ProviderError, ProviderErrorKind, ProviderResult, ProviderStream, StreamEvent,
    USER_AGENT, Usage, classify_reqwest_error, resolve_api_key, resolve_base_url,
};

/// Default base URL for the Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl GeminiConfig {
    /// Creates a new config from environment.
    ///
    /// Authentication resolution order:
    /// 1. `config_api_key` parameter (from config file)
    /// 2. `GEMINI_API_KEY` environment variable
    ///
    /// Base URL resolution order:
    /// 1. `GEMINI_BASE_URL` env var (if set and non-empty)
    /// 2. `config_base_url` parameter (if Some and non-empty)
    /// 3. Default: `https://generativelanguage.googleapis.com`
    pub fn from_env(
        model: String,
        max_tokens: u32,
        config_base_url: Option<&str>,
        config_api_key: Option<&str>,
    ) -> Result<Self> {
        let api_key = resolve_api_key(config_api_key, "GEMINI_API_KEY", "gemini")?;
        let base_url =
            resolve_base_url(config_base_url, "GEMINI_BASE_URL", DEFAULT_BASE_URL, "Gemini")?;

        Ok(Self {
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

/// Gemini API client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Sends the conversation and returns an async stream of events.
    ///
    /// # Errors
    /// Returns an error when the request fails or the server responds with
    /// a non-success status.
    pub async fn send_messages_stream(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
    ) -> Result<ProviderStream> {
        let contents = messages
            .iter()
            .map(|m| Content {
                // Gemini uses "model" where the normalized history says "assistant".
                role: Some(if m.role == "assistant" { "model" } else { "user" }),
                parts: vec![Part { text: &m.content }],
            })
            .collect();

        let request = GenerateContentRequest {
            contents,
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url, self.config.model
        );
        tracing::debug!(model = %self.config.model, "sending streaming request");

        let trace = DebugTrace::from_env(&self.config.model);
        let builder = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("user-agent", USER_AGENT)
            .header("x-goog-api-key", &self.config.api_key);

        let response = if let Some(trace) = &trace {
            let body = serde_json::to_vec(&request)?;
            trace.write_request(&body);
            builder
                .body(body)
                .send()
                .await
                .map_err(|e| classify_reqwest_error(&e))?
        } else {
            builder
                .json(&request)
                .send()
                .await
                .map_err(|e| classify_reqwest_error(&e))?
        };

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body).into());
        }

        let byte_stream = wrap_stream(trace, response.bytes_stream());
        Ok(Box::pin(GeminiSseParser::new(
            byte_stream,
            self.config.model.clone(),
        )))
    }
}

// ============================================================================
// SSE parsing
// ============================================================================

/// Parses Gemini SSE chunks into normalized `StreamEvent`s.
///
/// Gemini does not frame messages the way the events contract does, so the
/// parser synthesizes `MessageStart` on the first chunk and the terminal
/// `MessageDelta`/`MessageCompleted` pair when the byte stream ends.
struct GeminiSseParser<S> {
    inner: EventStream<S>,
    model: String,
    pending: VecDeque<StreamEvent>,
    started: bool,
    block_open: bool,
    final_usage: Option<Usage>,
    finish_reason: Option<String>,
    done: bool,
}

impl<S> GeminiSseParser<S> {
    fn new(stream: S, model: String) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
            model,
            pending: VecDeque::new(),
            started: false,
            block_open: false,
            final_usage: None,
            finish_reason: None,
            done: false,
        }
    }

    fn handle_event_data(&mut self, data: &str) -> ProviderResult<()> {
        let trimmed = data.trim();
        if trimmed.is_empty() || trimmed == "[DONE]" {
            return Ok(());
        }

        let value = serde_json::from_str::<Value>(trimmed).map_err(|err| {
            ProviderError::new(
                ProviderErrorKind::Parse,
                format!("Failed to parse SSE JSON: {err}"),
            )
        })?;

        if let Some(error) = value.get("error") {
            let error_type = error
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("error")
                .to_string();
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            self.pending.push_back(StreamEvent::Error {
                error_type,
                message,
            });
            return Ok(());
        }

        if !self.started {
            self.started = true;
            let model = value
                .get("modelVersion")
                .and_then(|v| v.as_str())
                .unwrap_or(&self.model)
                .to_string();
            self.pending.push_back(StreamEvent::MessageStart {
                model,
                usage: Usage::default(),
            });
        }

        if let Some(usage) = value.get("usageMetadata") {
            let input_tokens = usage
                .get("promptTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let output_tokens = usage
                .get("candidatesTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let cache_read_input_tokens = usage
                .get("cachedContentTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            self.final_usage = Some(Usage {
                input_tokens,
                output_tokens,
                cache_read_input_tokens,
                cache_creation_input_tokens: 0,
            });
        }

        let Some(candidate) = value
            .get("candidates")
            .and_then(|v| v.as_array())
            .and_then(|c| c.first())
        else {
            return Ok(());
        };

        if let Some(reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
            self.finish_reason = Some(reason.to_string());
        }

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array());
        if let Some(parts) = parts {
            for part in parts {
                let Some(text) = part.get("text").and_then(|t| t.as_str()) else {
                    continue;
                };
                if text.is_empty() {
                    continue;
                }
                if !self.block_open {
                    self.block_open = true;
                    self.pending
                        .push_back(StreamEvent::ContentBlockStart { index: 0 });
                }
                self.pending.push_back(StreamEvent::TextDelta {
                    index: 0,
                    text: text.to_string(),
                });
            }
        }

        Ok(())
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if self.block_open {
            self.pending
                .push_back(StreamEvent::ContentBlockCompleted { index: 0 });
        }
        self.pending.push_back(StreamEvent::MessageDelta {
            stop_reason: self.finish_reason.take(),
            usage: self.final_usage.take(),
        });
        self.pending.push_back(StreamEvent::MessageCompleted);
    }
}

impl<S, E> Stream for GeminiSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<StreamEvent>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if let Err(err) = this.handle_event_data(&event.data) {
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ProviderError::new(
                        ProviderErrorKind::Parse,
                        format!("SSE stream error: {e}"),
                    ))));
                }
                Poll::Ready(None) => this.finish(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
