//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use finchat_core::config::Config;

mod commands;

#[derive(Parser)]
#[command(name = "finchat")]
#[command(version = "0.1")]
#[command(about = "Financial analyst chat with streaming chart previews")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Interactive chat (default when no command is given)
    Chat {
        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Send a single prompt and stream the response
    Ask {
        /// The prompt to send to the assistant
        #[arg(short, long)]
        prompt: String,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,

        /// Emit each recomputed render frame as a JSON line
        #[arg(long)]
        frames: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Inspect the transactions dataset
    Dataset {
        #[command(subcommand)]
        command: DatasetCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Create a config file with the default template
    Init,
}

#[derive(clap::Subcommand)]
enum DatasetCommands {
    /// Print which dataset file is in effect
    Path,
    /// Print aggregate figures for the dataset
    Summary,
}

pub fn run() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load().context("load config")?;

    match cli.command.unwrap_or(Commands::Chat { model: None }) {
        Commands::Config { command } => commands::config::run(&command),
        Commands::Dataset { command } => commands::dataset::run(&command, &config),
        Commands::Chat { model } => {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(commands::chat::run(&config, model.as_deref()))
        }
        Commands::Ask {
            prompt,
            model,
            frames,
        } => {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(commands::ask::run(&config, &prompt, model.as_deref(), frames))
        }
    }
}

/// Logs go to stderr so stdout stays clean for responses and frames.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("FINCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
