//! Write-digest-verify-execute protocol for task scripts
//!
//! The coordinator writes a script to a fixed path and records its SHA-256.
//! The session is then sent a snippet that reads the file into memory,
//! hashes what it read, and only runs those in-memory bytes if the hash
//! matches. On mismatch the session itself exits, so nothing else is run
//! through it for the rest of the pass.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::error::ExecutionError;

/// Printed (with the script's exit code) after a verified script ran
pub const COMPLETE_SENTINEL: &str = "rani:task-complete";

/// Printed right before the session exits on a digest mismatch
pub const MISMATCH_SENTINEL: &str = "rani:integrity-mismatch";

/// A script written to disk together with the digest of those bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedScript {
    pub path: PathBuf,
    pub digest: String,
}

/// Lowercase hex SHA-256
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// The path as a string that can sit between single quotes
pub fn ensure_safe_path(path: &Path) -> Result<&str, ExecutionError> {
    match path.to_str() {
        Some(text) if !text.contains(['\'', '\n']) => Ok(text),
        _ => Err(ExecutionError::UnsafePath(path.to_path_buf())),
    }
}

/// Write the trimmed script body to `path` and digest the written bytes.
///
/// Trimming matters: `$(<file)` drops trailing newlines, so the bytes
/// hashed inside the session only equal the file when there are none.
pub async fn stage(path: &Path, script: &str) -> Result<StagedScript, ExecutionError> {
    ensure_safe_path(path)?;
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let body = script.trim();
    tokio::fs::write(path, body).await?;
    log::trace!("Staged {} bytes at {}", body.len(), path.display());

    Ok(StagedScript {
        path: path.to_path_buf(),
        digest: digest(body.as_bytes()),
    })
}

/// The snippet sent to a session to verify and run a staged script
pub fn verification_snippet(staged: &StagedScript) -> Result<String, ExecutionError> {
    let path = ensure_safe_path(&staged.path)?;
    let digest = &staged.digest;
    Ok(format!(
        "__rani_script=$(<'{path}'); \
         if [ \"$(printf '%s' \"$__rani_script\" | sha256sum | cut -d' ' -f1)\" != '{digest}' ]; then \
         printf '\\n%s\\n' '{MISMATCH_SENTINEL}'; exit 1; \
         fi; \
         bash -x /dev/stdin <<< \"$__rani_script\"; \
         __rani_rc=$?; \
         rm -f '{path}'; \
         printf '\\n%s %s\\n' '{COMPLETE_SENTINEL}' \"$__rani_rc\""
    ))
}

/// Exit code from the last complete sentinel line in `output`
pub fn parse_completion(output: &str) -> Option<i32> {
    let start = output.rfind(COMPLETE_SENTINEL)?;
    let rest = &output[start + COMPLETE_SENTINEL.len()..];
    let line = &rest[..rest.find('\n')?];
    line.trim().parse().ok()
}

/// Whether `output` reports a digest mismatch
pub fn reports_mismatch(output: &str) -> bool {
    output.contains(MISMATCH_SENTINEL)
}
