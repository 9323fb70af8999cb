//! Wanted-override persistence between invocations

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::WantedState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// File holding persisted overrides inside the state directory
pub const WANTED_FILE: &str = "wanted.toml";

/// On-disk form of the user's pending overrides
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RaniState {
    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,

    #[serde(default)]
    pub wanted: WantedState,
}

impl Default for RaniState {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            wanted: WantedState::default(),
        }
    }
}

impl RaniState {
    /// Get the state file path
    pub fn state_file() -> Result<PathBuf> {
        Ok(paths::state_dir()?.join(WANTED_FILE))
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk, stamping `last_updated`
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Utc::now();
        let content = toml::to_string_pretty(self).context("Failed to serialize state")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }
}
