//! Privilege elevation
//!
//! An escalated session is the normal interpreter command wrapped by an
//! elevator. Callers only ever see [`PrivilegeElevator`], never a tool name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Prefix this command with another program and its arguments
    fn prefixed(&self, program: &str, extra: &[&str]) -> Self {
        let mut args: Vec<String> = extra.iter().map(|s| (*s).to_string()).collect();
        args.push(self.program.clone());
        args.extend(self.args.iter().cloned());
        Self {
            program: program.to_string(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Turns an unprivileged command into one that runs with elevated rights
pub trait PrivilegeElevator: Send + Sync + fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// The command to spawn for an escalated session
    fn wrap(&self, command: &CommandSpec) -> CommandSpec;
}

/// polkit's `pkexec`, prompting through the desktop agent
#[derive(Debug, Clone, Copy, Default)]
pub struct Pkexec;

impl PrivilegeElevator for Pkexec {
    fn name(&self) -> &'static str {
        "pkexec"
    }

    fn wrap(&self, command: &CommandSpec) -> CommandSpec {
        command.prefixed("pkexec", &[])
    }
}

/// `sudo`, prompting on the controlling terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct Sudo;

impl PrivilegeElevator for Sudo {
    fn name(&self) -> &'static str {
        "sudo"
    }

    fn wrap(&self, command: &CommandSpec) -> CommandSpec {
        command.prefixed("sudo", &["--"])
    }
}

/// Runs the command unchanged (already root, or tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl PrivilegeElevator for Passthrough {
    fn name(&self) -> &'static str {
        "none"
    }

    fn wrap(&self, command: &CommandSpec) -> CommandSpec {
        command.clone()
    }
}

/// Elevator selection as it appears in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevatorKind {
    #[default]
    Pkexec,
    Sudo,
    None,
}

impl ElevatorKind {
    pub fn build(self) -> Arc<dyn PrivilegeElevator> {
        match self {
            Self::Pkexec => Arc::new(Pkexec),
            Self::Sudo => Arc::new(Sudo),
            Self::None => Arc::new(Passthrough),
        }
    }
}
