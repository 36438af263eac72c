//! Workflow Core - shared library for the workflow-tools suite
//!
//! This crate holds everything the `wt`, `pr`, `rp` and `tm` commands share:
//! external process execution, git and worktree helpers, repository
//! discovery with its on-disk cache, the shell directory-change handoff,
//! tmux session helpers and input validation.

pub mod config;
pub mod error;
pub mod git;
pub mod handoff;
pub mod process;
pub mod repos;
pub mod shell;
pub mod tmux;
pub mod validate;

pub use config::Config;
pub use error::{Error, Result};
pub use git::{GitRepo, WorktreeRecord};
pub use handoff::{request_directory_change, HandoffTarget};
pub use repos::{discover_repos, RemoteKind, RepoCache, RepoRecord};
