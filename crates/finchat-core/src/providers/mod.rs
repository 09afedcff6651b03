//! LLM provider implementations.

mod debug_trace;

pub mod anthropic;
pub mod gemini;
pub mod shared;

pub use shared::{
    ChatMessage, ProviderError, ProviderErrorKind, ProviderResult, ProviderStream, StreamEvent,
    Usage, resolve_api_key, resolve_base_url,
};

/// Provider selection based on model naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    Gemini,
}

/// Provider selection result with normalized model ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub kind: ProviderKind,
    pub model: String,
}

impl ProviderKind {
    /// Returns all provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Anthropic, ProviderKind::Gemini]
    }

    /// Returns the string identifier used in config files.
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Returns the `ProviderKind` for a given id string.
    pub fn from_id(id: &str) -> Option<ProviderKind> {
        match id.to_lowercase().as_str() {
            "anthropic" => Some(ProviderKind::Anthropic),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }

    /// Returns the human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Gemini => "Gemini",
        }
    }

    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// Resolves provider and model from a model identifier.
///
/// Supports explicit prefix format: `provider:model` or `provider/model`.
/// Without prefix, defaults to Anthropic.
pub fn resolve_provider(model: &str) -> ProviderSelection {
    let trimmed = model.trim();

    if let Some((kind, rest)) = parse_provider_prefix(trimmed)
        && !rest.is_empty()
    {
        return ProviderSelection {
            kind,
            model: rest.to_string(),
        };
    }

    ProviderSelection {
        kind: ProviderKind::Anthropic,
        model: trimmed.to_string(),
    }
}

fn parse_provider_prefix(model: &str) -> Option<(ProviderKind, &str)> {
    let (prefix, rest) = model
        .split_once(':')
        .or_else(|| model.split_once('/'))?;
    ProviderKind::from_id(prefix).map(|kind| (kind, rest.trim()))
}
