//! Shared turn execution with terminal output.
//!
//! Runs one turn and consumes its events concurrently. On every received
//! delta the full accumulated text is reclassified and, while streaming,
//! the markup payload rebalanced — the frame handed to the printer is
//! always safe to render.

use std::io::Write;

use anyhow::Result;
use finchat_core::config::Config;
use finchat_core::core::events::ChatEvent;
use finchat_core::core::turn::{EventSender, ProviderClient, create_event_channel, run_turn};
use finchat_core::dataset::Dataset;
use finchat_core::prompts;
use finchat_core::providers::ChatMessage;
use finchat_core::render::prepare_frame;

use crate::renderer::StreamPrinter;

/// How turn output is written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDisplay {
    /// Human-readable transcript (streamed text, rendered chart block).
    Plain,
    /// One JSON line per recomputed render frame.
    Frames,
}

/// Builds the effective system prompt: a user override from config, or the
/// built-in analyst prompt with the transactions dataset injected.
pub fn build_system_prompt(config: &Config) -> Result<String> {
    if let Some(prompt) = config.system_prompt_override()? {
        return Ok(prompt);
    }
    let dataset = Dataset::load(config)?;
    prompts::render_system_prompt(&dataset.to_json()?)
}

/// Runs one turn, printing output as it streams. Returns the updated
/// message history.
///
/// # Errors
/// Propagates turn failures (including interruption); the matching console
/// output has already been written by the event consumer.
pub async fn run_turn_to_stdout(
    client: &ProviderClient,
    messages: Vec<ChatMessage>,
    system: Option<&str>,
    display: TurnDisplay,
) -> Result<Vec<ChatMessage>> {
    let (tx, mut rx) = create_event_channel();
    let sender = EventSender::new(tx);

    let consume = async {
        let mut printer = StreamPrinter::new();
        let mut accumulated = String::new();
        let mut stdout = std::io::stdout();

        while let Some(event) = rx.recv().await {
            match &*event {
                ChatEvent::AssistantDelta { text } => {
                    accumulated.push_str(text);
                    let frame = prepare_frame(&accumulated, true);
                    match display {
                        TurnDisplay::Plain => {
                            let chunk = printer.streaming_update(&frame);
                            if !chunk.is_empty() {
                                let _ = write!(stdout, "{chunk}");
                                let _ = stdout.flush();
                            }
                        }
                        TurnDisplay::Frames => emit_frame_line(&mut stdout, &frame),
                    }
                }
                ChatEvent::TurnCompleted { final_text, .. } => {
                    let frame = prepare_frame(final_text, false);
                    match display {
                        TurnDisplay::Plain => {
                            let _ = write!(stdout, "{}", printer.finish(&frame));
                            let _ = stdout.flush();
                        }
                        TurnDisplay::Frames => emit_frame_line(&mut stdout, &frame),
                    }
                    break;
                }
                ChatEvent::Interrupted { .. } => {
                    let _ = writeln!(stdout, "\n(interrupted)");
                    break;
                }
                // The turn runner returns the matching error; printing it is
                // the caller's job.
                ChatEvent::Error { .. } => break,
                ChatEvent::TurnStarted
                | ChatEvent::AssistantCompleted { .. }
                | ChatEvent::UsageUpdate { .. } => {}
            }
        }
    };

    let (result, ()) = tokio::join!(run_turn(client, messages, system, &sender), consume);
    result
}

fn emit_frame_line(stdout: &mut std::io::Stdout, frame: &finchat_core::render::RenderFrame) {
    match serde_json::to_string(frame) {
        Ok(line) => {
            let _ = writeln!(stdout, "{line}");
            let _ = stdout.flush();
        }
        Err(err) => tracing::warn!(%err, "failed to serialize render frame"),
    }
}
