//! Provider-agnostic types shared across LLM backends.

use std::fmt;

use anyhow::{Context, Result};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Standard User-Agent header for finchat API requests.
pub const USER_AGENT: &str = concat!("finchat/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Config resolution helpers
// ============================================================================

/// Resolves an API key with precedence: config > env.
///
/// # Errors
/// Returns an error when neither the config value nor the environment
/// variable provides a non-empty key.
pub fn resolve_api_key(
    config_api_key: Option<&str>,
    env_var: &str,
    config_section: &str,
) -> Result<String> {
    if let Some(key) = config_api_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    std::env::var(env_var).context(format!(
        "No API key available. Set {env_var} or api_key in [providers.{config_section}]."
    ))
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error when the resolved URL is not well-formed.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
    provider_name: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str, provider_name: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {provider_name} base URL: {url}"))?;
    Ok(())
}

// ============================================================================
// Chat messages
// ============================================================================

/// One turn of conversation history sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

// ============================================================================
// Stream events
// ============================================================================

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens (non-cached)
    pub input_tokens: u64,
    /// Output tokens
    pub output_tokens: u64,
    /// Tokens read from cache
    pub cache_read_input_tokens: u64,
    /// Tokens written to cache
    pub cache_creation_input_tokens: u64,
}

/// Normalized streaming events produced by every provider backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Message started, contains model info and initial usage
    MessageStart { model: String, usage: Usage },
    /// A content block has started
    ContentBlockStart { index: usize },
    /// Text delta within a content block
    TextDelta { index: usize, text: String },
    /// A content block has ended
    ContentBlockCompleted { index: usize },
    /// Message delta (e.g., `stop_reason` update, final usage)
    MessageDelta {
        stop_reason: Option<String>,
        usage: Option<Usage>,
    },
    /// Message completed
    MessageCompleted,
    /// Ping event (keepalive)
    Ping,
    /// Error event from API
    Error { error_type: String, message: String },
}

/// A boxed stream of provider events.
pub type ProviderStream = BoxStream<'static, ProviderResult<StreamEvent>>;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

// ============================================================================
// Errors
// ============================================================================

/// Error categories for provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Failed to parse response (JSON parse error, invalid SSE, etc.)
    Parse,
    /// API-level error returned by the provider (e.g., overloaded)
    ApiError,
}

/// A provider failure with a display-ready summary.
#[derive(Debug, Clone)]
pub struct ProviderError {
    /// Error category
    pub kind: ProviderErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ProviderError {
    /// Creates a new provider error.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, extracting a cleaner message from a
    /// JSON error body when one is present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}");
        let details = if body.is_empty() {
            None
        } else {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body)
                && let Some(error_obj) = json.get("error")
                && let Some(msg) = error_obj.get("message").and_then(|v| v.as_str())
            {
                return Self {
                    kind: ProviderErrorKind::HttpStatus,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: ProviderErrorKind::HttpStatus,
            message,
            details,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// Creates an API error (from a mid-stream error event).
    pub fn api_error(error_type: &str, message: &str) -> Self {
        Self {
            kind: ProviderErrorKind::ApiError,
            message: format!("{error_type}: {message}"),
            details: None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Maps a reqwest transport error to a provider error.
pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {err}")).into()
    } else {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Request failed: {err}")).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let key = resolve_api_key(Some("from-config"), "FINCHAT_TEST_MISSING_KEY", "test");
        assert_eq!(key.unwrap(), "from-config");
    }

    #[test]
    fn test_resolve_api_key_ignores_blank_config() {
        let err = resolve_api_key(Some("   "), "FINCHAT_TEST_MISSING_KEY", "test");
        assert!(err.is_err());
    }

    #[test]
    fn test_resolve_base_url_falls_back_to_default() {
        let url = resolve_base_url(
            None,
            "FINCHAT_TEST_MISSING_URL",
            "https://example.com",
            "Test",
        )
        .unwrap();
        assert_eq!(url, "https://example.com");
    }

    #[test]
    fn test_resolve_base_url_rejects_invalid_config_url() {
        let err = resolve_base_url(
            Some("not a url"),
            "FINCHAT_TEST_MISSING_URL",
            "https://example.com",
            "Test",
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_http_status_error_extracts_json_message() {
        let body = r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = ProviderError::http_status(529, body);
        assert_eq!(err.message, "HTTP 529: Overloaded");
        assert!(err.details.is_some());
    }
}
