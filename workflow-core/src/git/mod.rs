//! Git operations for workflow-tools
//!
//! Everything shells out to the `git` binary; this module provides repository
//! root detection, branch helpers and worktree management.

mod repo;
mod worktree;

pub use repo::{current_branch_at, find_repo_root, is_dirty, origin_url_at, run_git, GitRepo};
pub use worktree::{containing, parse_worktree_porcelain, worktrees_dir, WorktreeRecord};
