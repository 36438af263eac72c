//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// Failure in the shared process/validation layer
    #[error(transparent)]
    Core(#[from] workflow_core::Error),

    /// `gh` exited nonzero
    #[error("gh failed: {0}")]
    Command(String),

    /// `gh` output did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// GraphQL endpoint reported errors
    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    /// Pull request not found
    #[error("PR #{0} not found")]
    PrNotFound(u64),

    /// No pull request for the checked-out branch
    #[error("No PR found for branch '{0}'")]
    NoPrForBranch(String),

    /// Working directory is not a GitHub repository
    #[error("Not in a GitHub repository or gh CLI not available")]
    NotGitHubRepo,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
