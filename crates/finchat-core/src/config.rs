//! Configuration management for finchat.
//!
//! Loads configuration from ${FINCHAT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Per-provider connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Base URL override (takes effect unless the env var is set).
    pub base_url: Option<String>,
    /// API key (falls back to the provider's env var).
    pub api_key: Option<String>,
}

/// Provider configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic: ProviderSettings,
    pub gemini: ProviderSettings,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The model to use, optionally prefixed with a provider id
    /// (e.g. `gemini:gemini-2.5-flash`, `anthropic:claude-haiku-4-5`).
    pub model: String,

    /// Maximum tokens for responses (optional)
    pub max_tokens: Option<u32>,

    /// Optional inline system prompt override
    pub system_prompt: Option<String>,

    /// Optional path to a file containing the system prompt
    pub system_prompt_file: Option<String>,

    /// Optional path to a transactions JSON file
    pub dataset_path: Option<String>,

    /// Provider configuration (base URLs, API keys).
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Config::DEFAULT_MODEL.to_string(),
            max_tokens: None,
            system_prompt: None,
            system_prompt_file: None,
            dataset_path: None,
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    pub const DEFAULT_MODEL: &str = "gemini:gemini-2.5-flash";
    pub const DEFAULT_MAX_TOKENS: u32 = 8192;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Saves only the model field to the config file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be written.
    pub fn save_model(model: &str) -> Result<()> {
        Self::save_model_to(&paths::config_path(), model)
    }

    /// Saves only the model field to a specific config file path.
    ///
    /// Creates the file with the default template if it doesn't exist.
    /// If the file exists, merges user values into the latest template so
    /// new comments and sections are always present.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read, parsed, or written.
    pub fn save_model_to(path: &Path, model: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["model"] = value(model);

        Self::write_config(path, &doc.to_string())
    }

    /// Writes the default config template to the given path.
    ///
    /// # Errors
    /// Returns an error when the file already exists or cannot be written.
    pub fn init_at(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config already exists at {}", path.display());
        }
        Self::write_config(path, default_config_template())
    }

    /// Returns the configured system prompt override, preferring the file
    /// when both are set. `None` means "use the built-in analyst prompt".
    ///
    /// # Errors
    /// Returns an error when the configured prompt file cannot be read.
    pub fn system_prompt_override(&self) -> Result<Option<String>> {
        if let Some(file) = &self.system_prompt_file {
            let contents = fs::read_to_string(file)
                .with_context(|| format!("Failed to read system prompt file {file}"))?;
            return Ok(Some(contents));
        }
        Ok(self.system_prompt.clone())
    }

    fn write_config(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// This ensures new comments/sections from the template are always present,
/// while preserving the user's customized values.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;

    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for finchat configuration and data directories.
    //!
    //! FINCHAT_HOME resolution order:
    //! 1. FINCHAT_HOME environment variable (if set)
    //! 2. ~/.config/finchat (default)

    use std::path::PathBuf;

    /// Returns the finchat home directory.
    pub fn finchat_home() -> PathBuf {
        if let Ok(home) = std::env::var("FINCHAT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("finchat"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        finchat_home().join("config.toml")
    }

    /// Returns the path to the persisted UI state file.
    pub fn state_path() -> PathBuf {
        finchat_home().join("state.toml")
    }

    /// Returns the path to the user-provided transactions file.
    pub fn dataset_path() -> PathBuf {
        finchat_home().join("transactions.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model, "gemini:gemini-2.5-flash");
        assert!(config.max_tokens.is_none());
        assert!(config.providers.anthropic.api_key.is_none());
    }

    #[test]
    fn test_load_from_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.model, Config::DEFAULT_MODEL);
    }

    #[test]
    fn test_load_from_parses_providers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "model = \"anthropic:claude-haiku-4-5\"\nmax_tokens = 4096\n\n[providers.anthropic]\nbase_url = \"http://localhost:9999\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "anthropic:claude-haiku-4-5");
        assert_eq!(config.max_tokens, Some(4096));
        assert_eq!(
            config.providers.anthropic.base_url.as_deref(),
            Some("http://localhost:9999")
        );
    }

    #[test]
    fn test_save_model_creates_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        Config::save_model_to(&path, "gemini:gemini-2.5-pro").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("model = \"gemini:gemini-2.5-pro\""));
        // Template comments survive the write.
        assert!(contents.contains("# max_tokens"));
    }

    #[test]
    fn test_save_model_preserves_user_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "model = \"old\"\nmax_tokens = 1234\n\n[providers.gemini]\napi_key = \"secret\"\n",
        )
        .unwrap();

        Config::save_model_to(&path, "new-model").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "new-model");
        assert_eq!(config.max_tokens, Some(1234));
        assert_eq!(config.providers.gemini.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_init_at_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "# existing").unwrap();

        let err = Config::init_at(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_system_prompt_override_prefers_file() {
        let dir = tempfile::tempdir().unwrap();
        let prompt_path = dir.path().join("prompt.md");
        fs::write(&prompt_path, "from file").unwrap();

        let config = Config {
            system_prompt: Some("inline".to_string()),
            system_prompt_file: Some(prompt_path.display().to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.system_prompt_override().unwrap().as_deref(),
            Some("from file")
        );
    }
}
