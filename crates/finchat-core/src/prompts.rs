//! Prompt assembly for the analyst assistant.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

/// Prompt template for the analyst system prompt (`MiniJinja`).
pub const SYSTEM_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/system_prompt.md"
));

/// Renders the analyst system prompt with the transactions dataset injected.
///
/// # Errors
/// Returns an error when the template fails to render.
pub fn render_system_prompt(transactions_json: &str) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("system_prompt", SYSTEM_PROMPT_TEMPLATE)
        .context("Failed to parse system prompt template")?;
    let template = env
        .get_template("system_prompt")
        .context("Failed to load system prompt template")?;
    template
        .render(context! { transactions => transactions_json })
        .context("Failed to render system prompt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_dataset_into_prompt() {
        let prompt = render_system_prompt("[{\"amount\": 1.0}]").unwrap();
        assert!(prompt.contains("financial data analyst"));
        assert!(prompt.contains("[{\"amount\": 1.0}]"));
        // The placeholder itself must be gone.
        assert!(!prompt.contains("{{ transactions }}"));
    }
}
