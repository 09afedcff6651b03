//! Config command handlers.

use anyhow::Result;
use finchat_core::config::{Config, paths};

use crate::cli::ConfigCommands;

pub fn run(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            println!("{}", paths::config_path().display());
            Ok(())
        }
        ConfigCommands::Init => {
            let path = paths::config_path();
            Config::init_at(&path)?;
            println!("Created config at {}", path.display());
            Ok(())
        }
    }
}
