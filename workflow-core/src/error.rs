//! Error types for workflow-tools

use thiserror::Error;

/// Result type alias for workflow-tools operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for workflow-tools operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// User-supplied input failed an allow-list check
    #[error("{0}")]
    Validation(String),

    /// An external program exited nonzero or could not be spawned
    #[error("`{program}` failed: {message}")]
    Command {
        /// Program that was invoked (git, gh, tmux, find, ...)
        program: String,
        /// First meaningful line of its error output
        message: String,
    },

    /// An external program exceeded its wall-clock budget
    #[error("`{program}` timed out after {seconds}s")]
    Timeout {
        /// Program that was invoked
        program: String,
        /// Budget that was exceeded
        seconds: u64,
    },

    /// A named entity (worktree, repository, session) does not exist
    #[error("{0}")]
    NotFound(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Build an external-command error
    pub fn command(program: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Command {
            program: program.into(),
            message: message.into(),
        }
    }
}
