//! Chat event types for streaming UIs.
//!
//! This module defines the contract for events emitted while a turn runs.
//! Events are serializable so a UI can also consume them as JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::providers::{ChatMessage, ProviderErrorKind};

/// Events emitted while an assistant turn is being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Turn has started processing.
    TurnStarted,

    /// Incremental text chunk from the assistant.
    AssistantDelta { text: String },

    /// Complete response from the assistant.
    AssistantCompleted { text: String },

    /// Token usage update from the provider.
    UsageUpdate {
        input_tokens: u64,
        output_tokens: u64,
        cache_read_input_tokens: u64,
        cache_creation_input_tokens: u64,
    },

    /// An error occurred during execution.
    Error {
        /// Error category for structured handling
        kind: ErrorKind,
        /// One-line summary
        message: String,
        /// Optional additional details
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },

    /// Execution was interrupted (e.g., by user signal).
    Interrupted {
        /// Partial assistant text received before interruption.
        #[serde(skip_serializing_if = "Option::is_none")]
        partial_content: Option<String>,
    },

    /// Turn completed successfully with final result.
    TurnCompleted {
        /// Final accumulated text from the assistant.
        final_text: String,
        /// Updated message history (includes the assistant response).
        messages: Vec<ChatMessage>,
    },
}

/// Error categories for `ChatEvent::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection/request timeout
    Timeout,
    /// Response parsing failed
    Parse,
    /// API-level error from provider
    ApiError,
    /// Internal/unknown error
    Internal,
}

impl From<ProviderErrorKind> for ErrorKind {
    fn from(kind: ProviderErrorKind) -> Self {
        match kind {
            ProviderErrorKind::HttpStatus => ErrorKind::HttpStatus,
            ProviderErrorKind::Timeout => ErrorKind::Timeout,
            ProviderErrorKind::Parse => ErrorKind::Parse,
            ProviderErrorKind::ApiError => ErrorKind::ApiError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::HttpStatus => write!(f, "http_status"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Parse => write!(f, "parse"),
            ErrorKind::ApiError => write!(f, "api_error"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}
