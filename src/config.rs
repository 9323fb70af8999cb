use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shellkit::{ElevatorKind, SessionSettings};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::paths;

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

// ============================================================================
// Config Structures
// ============================================================================

/// `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaniConfig {
    /// Account whose groups and login shell are managed
    pub user: String,
    /// How the escalated session is elevated
    pub elevator: ElevatorKind,
    pub session: SessionConfig,
}

/// `[session]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub interpreter: String,
    pub args: Vec<String>,
    pub startup_timeout_secs: u64,
    pub stop_grace_secs: u64,
    /// Task completion polling interval
    pub poll_interval_ms: u64,
    /// Chunks buffered per output subscriber
    pub output_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let settings = SessionSettings::default();
        Self {
            interpreter: settings.interpreter,
            args: settings.args,
            startup_timeout_secs: settings.startup_timeout.as_secs(),
            stop_grace_secs: settings.stop_grace.as_secs(),
            poll_interval_ms: 500,
            output_capacity: shellkit::bus::DEFAULT_CAPACITY,
        }
    }
}

impl Default for RaniConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            elevator: ElevatorKind::default(),
            session: SessionConfig::default(),
        }
    }
}

fn default_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

impl SessionConfig {
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            interpreter: self.interpreter.clone(),
            args: self.args.clone(),
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

impl RaniConfig {
    /// Load `config.toml` from the config directory; missing file gives defaults
    pub fn load() -> Result<Self> {
        let path = paths::config_dir()?.join(CONFIG_FILE);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format: {}", path.display()))?;

        declarative::validate_name(declarative::ResourceKind::Group, &config.user)
            .with_context(|| format!("Invalid user in {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
