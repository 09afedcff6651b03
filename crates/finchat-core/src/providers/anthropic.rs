//! Anthropic provider (Messages API, streaming).

use std::pin::Pin;

use anyhow::Result;
use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::providers::debug_trace::{DebugTrace, wrap_stream};
use crate::providers::shared::{
    ChatMessage, ProviderError, ProviderErrorKind, ProviderResult, ProviderStream, StreamEvent,
    USER_AGENT, Usage, classify_reqwest_error, resolve_api_key, resolve_base_url,
};

/// Default base URL for the Anthropic API.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic client.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Creates a new config from environment.
    ///
    /// Authentication resolution order:
    /// 1. `config_api_key` parameter (from config file)
    /// 2. `ANTHROPIC_API_KEY` environment variable
    ///
    /// Base URL resolution order:
    /// 1. `ANTHROPIC_BASE_URL` env var (if set and non-empty)
    /// 2. `config_base_url` parameter (if Some and non-empty)
    /// 3. Default: `https://api.anthropic.com`
    pub fn from_env(
        model: String,
        max_tokens: u32,
        config_base_url: Option<&str>,
        config_api_key: Option<&str>,
    ) -> Result<Self> {
        let api_key = resolve_api_key(config_api_key, "ANTHROPIC_API_KEY", "anthropic")?;
        let base_url = resolve_base_url(
            config_base_url,
            "ANTHROPIC_BASE_URL",
            DEFAULT_BASE_URL,
            "Anthropic",
        )?;

        Ok(Self {
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }
}

#[derive(Serialize)]
struct StreamingMessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ApiMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Anthropic API client.
pub struct AnthropicClient {
    config: AnthropicConfig,
    http: reqwest::Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    ///
    /// # Panics
    /// - In test builds, panics if `base_url` is the production API.
    /// - At runtime, panics if `FINCHAT_BLOCK_REAL_API=1` and `base_url` is
    ///   the production API.
    ///
    /// This prevents tests from accidentally making real network requests.
    pub fn new(config: AnthropicConfig) -> Self {
        #[cfg(test)]
        assert!(
            config.base_url != DEFAULT_BASE_URL,
            "Tests must not use the production Anthropic API! \
             Set ANTHROPIC_BASE_URL to a mock server."
        );

        #[cfg(not(test))]
        if std::env::var("FINCHAT_BLOCK_REAL_API").is_ok_and(|v| v == "1") {
            assert!(
                config.base_url != DEFAULT_BASE_URL,
                "FINCHAT_BLOCK_REAL_API=1 but trying to use the production Anthropic API! \
                 Set ANTHROPIC_BASE_URL to a mock server."
            );
        }

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
        let api_messages = messages
            .iter()
            .map(|m| ApiMessage {
                role: &m.role,
                content: &m.content,
            })
            .collect();

        let request = StreamingMessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: api_messages,
            stream: true,
        };

        let url = format!("{}/v1/messages", self.config.base_url);
        tracing::debug!(model = %self.config.model, "sending streaming request");

        let trace = DebugTrace::from_env(&self.config.model);
        let builder = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .header("user-agent", USER_AGENT)
            .header("anthropic-version", API_VERSION)
            .header("x-api-key", &self.config.api_key);

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
        Ok(Box::pin(SseParser::new(byte_stream)))
    }
}

// ============================================================================
// SSE parsing
// ============================================================================

/// SSE parser that converts a Messages API byte stream into `StreamEvent`s.
struct SseParser<S> {
    inner: EventStream<S>,
}

impl<S> SseParser<S> {
    fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
        }
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<StreamEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                Poll::Ready(Some(parse_sse_event_fields(&event.event, &event.data)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(ProviderError::new(
                ProviderErrorKind::Parse,
                format!("SSE stream error: {e}"),
            )))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn parse_data<T: serde::de::DeserializeOwned>(data: Option<&str>, label: &str) -> ProviderResult<T> {
    let data = data
        .ok_or_else(|| ProviderError::new(ProviderErrorKind::Parse, format!("Missing data for {label}")))?;
    serde_json::from_str(data).map_err(|err| {
        ProviderError::new(
            ProviderErrorKind::Parse,
            format!("Failed to parse {label}: {err}"),
        )
    })
}

fn parse_sse_event_fields(event_type: &str, data: &str) -> ProviderResult<StreamEvent> {
    let data = if data.trim().is_empty() {
        None
    } else {
        Some(data)
    };

    match event_type {
        "ping" => Ok(StreamEvent::Ping),
        "message_start" => {
            let parsed: SseMessageStart = parse_data(data, "message_start")?;
            Ok(StreamEvent::MessageStart {
                model: parsed.message.model,
                usage: parsed.message.usage.into(),
            })
        }
        "content_block_start" => {
            let parsed: SseContentBlockStart = parse_data(data, "content_block_start")?;
            Ok(StreamEvent::ContentBlockStart {
                index: parsed.index,
            })
        }
        "content_block_delta" => {
            let parsed: SseContentBlockDelta = parse_data(data, "content_block_delta")?;
            match parsed.delta.delta_type.as_str() {
                "text_delta" => Ok(StreamEvent::TextDelta {
                    index: parsed.index,
                    text: parsed.delta.text.unwrap_or_default(),
                }),
                other => Err(ProviderError::new(
                    ProviderErrorKind::Parse,
                    format!("Unknown delta type: {other}"),
                )),
            }
        }
        "content_block_stop" => {
            let parsed: SseContentBlockStop = parse_data(data, "content_block_stop")?;
            Ok(StreamEvent::ContentBlockCompleted {
                index: parsed.index,
            })
        }
        "message_delta" => {
            let parsed: SseMessageDelta = parse_data(data, "message_delta")?;
            Ok(StreamEvent::MessageDelta {
                stop_reason: parsed.delta.stop_reason,
                usage: parsed.usage.map(Into::into),
            })
        }
        "message_stop" => Ok(StreamEvent::MessageCompleted),
        "error" => {
            let parsed: SseError = parse_data(data, "error")?;
            Ok(StreamEvent::Error {
                error_type: parsed.error.error_type,
                message: parsed.error.message,
            })
        }
        other => Err(ProviderError::new(
            ProviderErrorKind::Parse,
            format!("Unknown SSE event type: {other}"),
        )),
    }
}

#[derive(Deserialize)]
struct SseMessageStart {
    message: SseMessage,
}

#[derive(Deserialize)]
struct SseMessage {
    model: String,
    #[serde(default)]
    usage: SseUsage,
}

#[derive(Deserialize, Default)]
struct SseUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
}

impl From<SseUsage> for Usage {
    fn from(u: SseUsage) -> Self {
        Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            cache_read_input_tokens: u.cache_read_input_tokens,
            cache_creation_input_tokens: u.cache_creation_input_tokens,
        }
    }
}

#[derive(Deserialize)]
struct SseContentBlockStart {
    index: usize,
}

#[derive(Deserialize)]
struct SseContentBlockDelta {
    index: usize,
    delta: SseDelta,
}

#[derive(Deserialize)]
struct SseDelta {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct SseContentBlockStop {
    index: usize,
}

#[derive(Deserialize)]
struct SseMessageDelta {
    delta: SseMessageDeltaInner,
    usage: Option<SseUsage>,
}

#[derive(Deserialize)]
struct SseMessageDeltaInner {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct SseError {
    error: SseErrorBody,
}

#[derive(Deserialize)]
struct SseErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
