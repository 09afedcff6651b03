//! Turn runner: drives one provider stream to completion.
//!
//! The runner owns the turn's `AccumulatedText`: it appends every received
//! text delta and emits `ChatEvent`s over a bounded channel. It never
//! classifies or renders — consumers recompute frames from the accumulated
//! text on whatever cadence suits them (see `crate::render`).

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::Config;
use crate::core::events::{ChatEvent, ErrorKind};
use crate::core::interrupt::{self, InterruptedError};
use crate::providers::anthropic::{AnthropicClient, AnthropicConfig};
use crate::providers::gemini::{GeminiClient, GeminiConfig};
use crate::providers::{
    ChatMessage, ProviderKind, ProviderStream, StreamEvent, resolve_provider,
};

/// Channel-based event sender (async, bounded).
pub type ChatEventTx = mpsc::Sender<Arc<ChatEvent>>;

/// Channel-based event receiver (async, bounded).
pub type ChatEventRx = mpsc::Receiver<Arc<ChatEvent>>;

/// Default channel capacity for event streams.
///
/// Set high enough (128) to accommodate best-effort delta sends without
/// blocking the stream consumer.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Creates a bounded event channel with the default capacity.
pub fn create_event_channel() -> (ChatEventTx, ChatEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Event sender with two delivery modes.
///
/// Use `send_delta` for high-volume events (`AssistantDelta`) that can be
/// dropped under backpressure, and `send_important` for events the UI must
/// not miss.
#[derive(Clone)]
pub struct EventSender {
    tx: ChatEventTx,
}

impl EventSender {
    pub fn new(tx: ChatEventTx) -> Self {
        Self { tx }
    }

    /// Best-effort send; drops the event when the channel is full or closed.
    pub fn send_delta(&self, event: ChatEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(Arc::new(event)) {
            tracing::debug!("event channel full, dropping delta event");
        }
    }

    /// Reliable send; awaits channel capacity. A closed channel is not an
    /// error for the runner — the consumer has simply gone away.
    pub async fn send_important(&self, event: ChatEvent) {
        let _ = self.tx.send(Arc::new(event)).await;
    }
}

/// A configured streaming client for whichever provider the model resolves
/// to.
pub enum ProviderClient {
    Anthropic(AnthropicClient),
    Gemini(GeminiClient),
}

impl ProviderClient {
    /// Builds a client from config, with an optional model override.
    ///
    /// # Errors
    /// Returns an error when credentials or base URLs cannot be resolved.
    pub fn from_config(config: &Config, model_override: Option<&str>) -> Result<Self> {
        let model_id = model_override.unwrap_or(&config.model);
        let selection = resolve_provider(model_id);
        let max_tokens = config.max_tokens.unwrap_or(Config::DEFAULT_MAX_TOKENS);

        match selection.kind {
            ProviderKind::Anthropic => {
                let provider = &config.providers.anthropic;
                let client_config = AnthropicConfig::from_env(
                    selection.model,
                    max_tokens,
                    provider.base_url.as_deref(),
                    provider.api_key.as_deref(),
                )?;
                Ok(ProviderClient::Anthropic(AnthropicClient::new(
                    client_config,
                )))
            }
            ProviderKind::Gemini => {
                let provider = &config.providers.gemini;
                let client_config = GeminiConfig::from_env(
                    selection.model,
                    max_tokens,
                    provider.base_url.as_deref(),
                    provider.api_key.as_deref(),
                )?;
                Ok(ProviderClient::Gemini(GeminiClient::new(client_config)))
            }
        }
    }

    /// Sends the conversation and returns an async stream of events.
    ///
    /// # Errors
    /// Returns an error when the request fails.
    pub async fn send_messages_stream(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
    ) -> Result<ProviderStream> {
        match self {
            ProviderClient::Anthropic(client) => {
                client.send_messages_stream(messages, system).await
            }
            ProviderClient::Gemini(client) => client.send_messages_stream(messages, system).await,
        }
    }
}

/// Runs one assistant turn: sends the history, accumulates streamed text,
/// and emits events. Returns the updated history including the assistant
/// response.
///
/// # Errors
/// Returns an error when the provider request fails, the stream reports an
/// error, or the turn is interrupted (`InterruptedError`). In every case a
/// matching event has already been emitted.
pub async fn run_turn(
    client: &ProviderClient,
    messages: Vec<ChatMessage>,
    system: Option<&str>,
    sender: &EventSender,
) -> Result<Vec<ChatMessage>> {
    sender.send_important(ChatEvent::TurnStarted).await;

    let mut stream = match client.send_messages_stream(&messages, system).await {
        Ok(stream) => stream,
        Err(err) => {
            sender
                .send_important(error_event(&err))
                .await;
            return Err(err).context("Failed to start provider stream");
        }
    };

    let mut accumulated = String::new();

    loop {
        tokio::select! {
            () = interrupt::wait_for_interrupt() => {
                tracing::debug!("turn interrupted by user");
                sender
                    .send_important(ChatEvent::Interrupted {
                        partial_content: if accumulated.is_empty() {
                            None
                        } else {
                            Some(accumulated.clone())
                        },
                    })
                    .await;
                return Err(InterruptedError.into());
            }
            item = stream.next() => match item {
                None => break,
                Some(Ok(event)) => {
                    handle_stream_event(event, &mut accumulated, sender).await?;
                }
                Some(Err(err)) => {
                    sender
                        .send_important(ChatEvent::Error {
                            kind: err.kind.into(),
                            message: err.message.clone(),
                            details: err.details.clone(),
                        })
                        .await;
                    return Err(err.into());
                }
            },
        }
    }

    sender
        .send_important(ChatEvent::AssistantCompleted {
            text: accumulated.clone(),
        })
        .await;

    let mut messages = messages;
    messages.push(ChatMessage::assistant(accumulated.clone()));

    sender
        .send_important(ChatEvent::TurnCompleted {
            final_text: accumulated,
            messages: messages.clone(),
        })
        .await;

    Ok(messages)
}

/// Handles one stream event; an `Err` ends the turn (the matching error
/// event has already been emitted).
async fn handle_stream_event(
    event: StreamEvent,
    accumulated: &mut String,
    sender: &EventSender,
) -> Result<()> {
    match event {
        StreamEvent::TextDelta { text, .. } if !text.is_empty() => {
            accumulated.push_str(&text);
            sender.send_delta(ChatEvent::AssistantDelta { text });
        }
        StreamEvent::MessageStart { usage, .. } => {
            sender.send_delta(ChatEvent::UsageUpdate {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cache_read_input_tokens: usage.cache_read_input_tokens,
                cache_creation_input_tokens: usage.cache_creation_input_tokens,
            });
        }
        StreamEvent::MessageDelta {
            usage: Some(usage), ..
        } => {
            sender.send_delta(ChatEvent::UsageUpdate {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cache_read_input_tokens: usage.cache_read_input_tokens,
                cache_creation_input_tokens: usage.cache_creation_input_tokens,
            });
        }
        StreamEvent::Error {
            error_type,
            message,
        } => {
            let err = crate::providers::ProviderError::api_error(&error_type, &message);
            sender
                .send_important(ChatEvent::Error {
                    kind: ErrorKind::ApiError,
                    message: err.message.clone(),
                    details: None,
                })
                .await;
            return Err(err.into());
        }
        StreamEvent::TextDelta { .. }
        | StreamEvent::ContentBlockStart { .. }
        | StreamEvent::ContentBlockCompleted { .. }
        | StreamEvent::MessageDelta { .. }
        | StreamEvent::MessageCompleted
        | StreamEvent::Ping => {}
    }
    Ok(())
}

fn error_event(err: &anyhow::Error) -> ChatEvent {
    let (kind, details) = err
        .downcast_ref::<crate::providers::ProviderError>()
        .map_or((ErrorKind::Internal, None), |p| {
            (p.kind.into(), p.details.clone())
        });
    ChatEvent::Error {
        kind,
        message: format!("{err:#}"),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_delta_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);

        sender.send_delta(ChatEvent::AssistantDelta {
            text: "first".to_string(),
        });
        // Channel is full now; this one is dropped instead of blocking.
        sender.send_delta(ChatEvent::AssistantDelta {
            text: "second".to_string(),
        });

        let ev = rx.recv().await.unwrap();
        assert!(matches!(&*ev, ChatEvent::AssistantDelta { text } if text == "first"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_important_delivers_in_order() {
        let (tx, mut rx) = create_event_channel();
        let sender = EventSender::new(tx);

        sender.send_important(ChatEvent::TurnStarted).await;
        sender
            .send_important(ChatEvent::AssistantCompleted {
                text: "done".to_string(),
            })
            .await;

        assert!(matches!(&*rx.recv().await.unwrap(), ChatEvent::TurnStarted));
        assert!(matches!(
            &*rx.recv().await.unwrap(),
            ChatEvent::AssistantCompleted { text } if text == "done"
        ));
    }
}
