//! One-shot commands for queries against the live system

use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::process::Command;

/// Exit code and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run a script to completion in a clean bash with the C locale.
///
/// Output is captured, never streamed.
pub async fn run_bash(script: &str) -> Result<CommandResult> {
    let output = Command::new("bash")
        .args(["--norc", "--noprofile", "-c"])
        .arg(format!("LANG=C {script}"))
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("Failed to execute: {script}"))?;

    Ok(CommandResult {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_bash_captures_both_streams() {
        let result = run_bash("echo out; echo err >&2; exit 3").await.unwrap();
        assert_eq!(result.code, Some(3));
        assert!(!result.success());
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_run_bash_uses_c_locale() {
        let result = run_bash("printenv LANG").await.unwrap();
        assert_eq!(result.stdout.trim(), "C");
    }

    #[tokio::test]
    async fn test_killed_process_has_no_code() {
        let result = run_bash("kill -9 $$").await.unwrap();
        assert_eq!(result.code, None);
        assert!(!result.success());
    }
}
