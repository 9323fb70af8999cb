//! Error types for state tracking and reconciliation.

use thiserror::Error;

/// Errors raised while mutating wanted state.
///
/// Diff computation and script synthesis never fail; only user input
/// entering the store is checked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A resource name contains characters that could alter a shell script
    #[error("invalid {kind} name: {name:?}")]
    InvalidName {
        /// Resource kind the name was given for
        kind: String,
        /// The rejected name
        name: String,
    },

    /// A resource kind string did not match any known kind
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// A DNS provider name did not match the known catalogue
    #[error("unknown DNS provider: {0}")]
    UnknownDnsProvider(String),

    /// A login shell name did not match the known catalogue
    #[error("unknown login shell: {0}")]
    UnknownShell(String),
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, Error>;
