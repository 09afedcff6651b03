//! Interactive chat REPL.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use finchat_core::config::Config;
use finchat_core::core::interrupt::{self, InterruptedError};
use finchat_core::core::turn::ProviderClient;
use finchat_core::providers::ChatMessage;
use finchat_core::state;

use super::turn_io::{TurnDisplay, build_system_prompt, run_turn_to_stdout};

const EXAMPLE_PROMPTS: &[(&str, &str)] = &[
    (
        "Spending Trends",
        "Show me my spending trends over the last 6 months",
    ),
    (
        "Category Breakdown",
        "Create a pie chart of my expenses by category",
    ),
    (
        "Monthly Comparison",
        "Compare my income vs expenses by month",
    ),
    (
        "Financial Summary",
        "What's my total savings and biggest expense category?",
    ),
];

pub async fn run(config: &Config, model_override: Option<&str>) -> Result<()> {
    interrupt::init();

    let client =
        ProviderClient::from_config(config, model_override).context("configure provider")?;
    let system = build_system_prompt(config).context("build system prompt")?;

    println!("finchat — financial analyst chat (:q to quit)");
    maybe_show_welcome();

    let mut messages: Vec<ChatMessage> = Vec::new();
    let stdin = std::io::stdin();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("read from stdin")?;
        if read == 0 {
            break; // EOF
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == ":q" || input == ":quit" {
            break;
        }

        let mut next = messages.clone();
        next.push(ChatMessage::user(input));

        match run_turn_to_stdout(&client, next, Some(&system), TurnDisplay::Plain).await {
            Ok(updated) => messages = updated,
            Err(err) if err.downcast_ref::<InterruptedError>().is_some() => {
                // The partial turn is dropped from history; keep chatting.
                interrupt::reset();
            }
            Err(err) => eprintln!("Error: {err:#}"),
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Prints first-run tips and example prompts, once per installation.
fn maybe_show_welcome() {
    if state::welcome_seen() {
        return;
    }

    println!();
    println!("Welcome to finchat — your financial data analyst.");
    println!("Ask questions about your transactions and get answers as text");
    println!("or as charts, streamed while they are generated.");
    println!();
    println!("Try these example prompts:");
    for (title, prompt) in EXAMPLE_PROMPTS {
        println!("  {title}: \"{prompt}\"");
    }
    println!();

    if let Err(err) = state::set_welcome_seen() {
        tracing::warn!(%err, "failed to persist welcome flag");
    }
}
