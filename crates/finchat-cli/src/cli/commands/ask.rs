//! Ask command handler: one prompt, one streamed response.

use anyhow::{Context, Result};
use finchat_core::config::Config;
use finchat_core::core::interrupt;
use finchat_core::core::turn::ProviderClient;
use finchat_core::providers::ChatMessage;

use super::turn_io::{TurnDisplay, build_system_prompt, run_turn_to_stdout};

pub async fn run(
    config: &Config,
    prompt: &str,
    model_override: Option<&str>,
    frames: bool,
) -> Result<()> {
    interrupt::init();

    let client =
        ProviderClient::from_config(config, model_override).context("configure provider")?;
    let system = build_system_prompt(config).context("build system prompt")?;

    let messages = vec![ChatMessage::user(prompt)];
    let display = if frames {
        TurnDisplay::Frames
    } else {
        TurnDisplay::Plain
    };

    run_turn_to_stdout(&client, messages, Some(&system), display).await?;
    Ok(())
}
