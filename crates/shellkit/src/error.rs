//! Error types for shell sessions.

use thiserror::Error;

/// Errors raised by [`CommandSession`](crate::CommandSession) and
/// [`SessionPool`](crate::SessionPool).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The interpreter could not be launched, exited before becoming
    /// ready, or the elevation prompt was refused
    #[error("failed to start {program}: {message}")]
    Spawn {
        /// Program that was launched (the elevator when escalated)
        program: String,
        /// What went wrong
        message: String,
    },

    /// `write_line` was called before `start` succeeded
    #[error("session has not been started")]
    NotStarted,

    /// The interpreter has already exited
    #[error("session has already exited")]
    Closed,

    /// Other I/O failure while talking to the interpreter
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
