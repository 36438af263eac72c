//! Git worktree listing, creation and removal
//!
//! Worktrees live next to the repository in `<repo>.worktrees/<name>`.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::repo::{run_git, GitRepo};
use crate::{Error, Result};

/// One entry of `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeRecord {
    /// Checkout directory
    pub path: PathBuf,
    /// Basename of `path`
    pub name: String,
    /// Checked-out branch, `None` when detached
    pub branch: Option<String>,
    /// Administrative entry of a bare repository
    pub is_bare: bool,
}

impl WorktreeRecord {
    fn from_fields(path: &str, branch: Option<&str>, is_bare: bool) -> Self {
        let path = PathBuf::from(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let branch = branch
            .map(|b| b.strip_prefix("refs/heads/").unwrap_or(b).to_string())
            .filter(|b| !b.is_empty());

        Self {
            path,
            name,
            branch,
            is_bare,
        }
    }

    /// Branch label used in pickers and listings
    pub fn branch_label(&self) -> String {
        match (&self.branch, self.is_bare) {
            (_, true) => "[bare]".to_string(),
            (Some(branch), false) => format!("[{}]", branch),
            (None, false) => "[detached]".to_string(),
        }
    }
}

/// Parse the porcelain worktree listing.
///
/// Records are separated by blank lines; the final record may lack one.
pub fn parse_worktree_porcelain(text: &str) -> Vec<WorktreeRecord> {
    let mut records = Vec::new();
    let mut path: Option<&str> = None;
    let mut branch: Option<&str> = None;
    let mut bare = false;

    // A trailing empty line closes the last record
    for line in text.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if let Some(p) = path.take() {
                records.push(WorktreeRecord::from_fields(p, branch, bare));
            }
            branch = None;
            bare = false;
        } else if let Some(rest) = line.strip_prefix("worktree ") {
            path = Some(rest);
        } else if let Some(rest) = line.strip_prefix("branch ") {
            branch = Some(rest);
        } else if line == "bare" {
            bare = true;
        }
    }

    records
}

/// Sibling directory holding all worktrees of `repo_root`
pub fn worktrees_dir(repo_root: &Path) -> PathBuf {
    let name = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = repo_root.parent().unwrap_or(repo_root);
    parent.join(format!("{}.worktrees", name))
}

/// The deepest worktree whose path equals or contains `cwd`
pub fn containing<'a>(worktrees: &'a [WorktreeRecord], cwd: &Path) -> Option<&'a WorktreeRecord> {
    let cwd = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
    worktrees
        .iter()
        .filter(|wt| !wt.is_bare)
        .filter_map(|wt| {
            let path = wt.path.canonicalize().unwrap_or_else(|_| wt.path.clone());
            cwd.starts_with(&path).then(|| (path.components().count(), wt))
        })
        .max_by_key(|(depth, _)| *depth)
        .map(|(_, wt)| wt)
}

impl GitRepo {
    /// Path of the named worktree
    pub fn worktree_path(&self, name: &str) -> PathBuf {
        worktrees_dir(self.root()).join(name)
    }

    /// All worktrees, main checkout included
    pub async fn list_worktrees(&self) -> Result<Vec<WorktreeRecord>> {
        let out = run_git(&["worktree", "list", "--porcelain"], Some(self.root())).await?;
        Ok(parse_worktree_porcelain(&out))
    }

    /// Worktrees that can be switched into (bare entry excluded)
    pub async fn checkouts(&self) -> Result<Vec<WorktreeRecord>> {
        Ok(self
            .list_worktrees()
            .await?
            .into_iter()
            .filter(|wt| !wt.is_bare)
            .collect())
    }

    /// Create worktree `name` checking out `branch`.
    ///
    /// With `new_branch`, the branch is created at HEAD via `-b`.
    pub async fn create_worktree(&self, name: &str, branch: &str, new_branch: bool) -> Result<PathBuf> {
        let path = self.worktree_path(name);
        if path.exists() {
            return Err(Error::Other(format!(
                "Worktree '{}' already exists at {}",
                name,
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        let args: Vec<&str> = if new_branch {
            vec!["worktree", "add", "-b", branch, &path_str]
        } else {
            vec!["worktree", "add", &path_str, branch]
        };

        debug!(name, branch, new_branch, path = %path.display(), "Creating worktree");
        run_git(&args, Some(self.root())).await?;
        Ok(path)
    }

    /// Remove a worktree, `--force` discarding local changes
    pub async fn remove_worktree(&self, path: &Path, force: bool) -> Result<()> {
        let path_str = path.to_string_lossy().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);

        debug!(path = %path.display(), force, "Removing worktree");
        run_git(&args, Some(self.root())).await.map(|_| ())
    }
}
