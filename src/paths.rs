//! Centralized path resolution for rani
//!
//! # Environment Variables
//!
//! - `RANI_CONFIG_DIR` - Override config directory
//! - `RANI_STATE_DIR` - Override state directory (wanted overrides)
//! - `RANI_DATA_DIR` - Override local data directory (temp task script)
//!
//! # Path Resolution Priority
//!
//! Each directory resolves as:
//! 1. its `RANI_*` environment variable
//! 2. the matching `XDG_*_HOME/rani`
//! 3. `~/.config/rani`, `~/.local/state/rani` or `~/.local/share/rani`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "RANI_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "RANI_STATE_DIR";

/// Environment variable for local data directory override
pub const ENV_DATA_DIR: &str = "RANI_DATA_DIR";

/// File name of the script staged for each task
pub const TASK_SCRIPT_FILE: &str = "taskscript.tmp";

const APP_DIR: &str = "rani";

/// Resolve one directory through env override, XDG variable, then home default
fn resolve(override_var: &str, xdg_var: &str, home_parts: &[&str]) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(override_var) {
        let path = expand(&dir);
        log::debug!("Using dir from {}: {}", override_var, path.display());
        return Ok(path);
    }

    if let Ok(xdg) = std::env::var(xdg_var)
        && !xdg.is_empty()
    {
        let path = PathBuf::from(xdg).join(APP_DIR);
        log::debug!("Using {}: {}", xdg_var, path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home_parts
        .iter()
        .fold(home, |path, part| path.join(part))
        .join(APP_DIR);
    log::debug!("Using default dir: {}", path.display());
    Ok(path)
}

/// Get the rani config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve(ENV_CONFIG_DIR, "XDG_CONFIG_HOME", &[".config"])
}

/// Get the rani state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve(ENV_STATE_DIR, "XDG_STATE_HOME", &[".local", "state"])
}

/// Get the application local-data directory path
pub fn data_dir() -> Result<PathBuf> {
    resolve(ENV_DATA_DIR, "XDG_DATA_HOME", &[".local", "share"])
}

/// The fixed path every task script is staged at
pub fn task_script_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(TASK_SCRIPT_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
