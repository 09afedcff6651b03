//! Persisted UI state.
//!
//! A single process-wide flag survives restarts: whether the user has seen
//! the first-run welcome. Stored in ${FINCHAT_HOME}/state.toml.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::paths;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
struct State {
    welcome_seen: bool,
}

fn load_state(path: &Path) -> State {
    // Missing or unreadable state is treated as first run.
    fs::read_to_string(path)
        .ok()
        .and_then(|contents| toml::from_str(&contents).ok())
        .unwrap_or_default()
}

fn store_state(path: &Path, state: State) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = toml::to_string(&state).context("Failed to serialize state")?;
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Whether the first-run welcome has been shown.
pub fn welcome_seen() -> bool {
    welcome_seen_at(&paths::state_path())
}

/// Whether the welcome flag is set in a specific state file.
pub fn welcome_seen_at(path: &Path) -> bool {
    load_state(path).welcome_seen
}

/// Marks the first-run welcome as shown.
///
/// # Errors
/// Returns an error when the state file cannot be written.
pub fn set_welcome_seen() -> Result<()> {
    set_welcome_seen_at(&paths::state_path())
}

/// Marks the welcome flag in a specific state file.
///
/// # Errors
/// Returns an error when the state file cannot be written.
pub fn set_welcome_seen_at(path: &Path) -> Result<()> {
    let mut state = load_state(path);
    state.welcome_seen = true;
    store_state(path, state)
}
