//! Error types for execution passes.

use shellkit::SessionError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end (or refuse to start) an execution pass.
///
/// Per-task failures are not errors; they are reported as
/// [`TaskOutcome`](super::TaskOutcome) values and the pass continues.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Another pass is already running; nothing was changed
    #[error("an execution pass is already running")]
    Busy,

    /// A session could not be started; no task was executed
    #[error("could not start shell session: {0}")]
    Spawn(#[source] SessionError),

    /// The task script path cannot be single-quoted in a shell snippet
    #[error("task script path cannot be quoted safely: {}", .0.display())]
    UnsafePath(PathBuf),

    /// Staging the task script failed
    #[error("failed to stage task script: {0}")]
    Io(#[from] std::io::Error),
}
