//! Git repository detection and branch operations

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::process;
use crate::{Error, Result};

/// Run `git` with `args` and return trimmed stdout
///
/// A nonzero exit becomes `Error::Command` carrying git's best error line.
pub async fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<String> {
    process::run_captured("git", args, cwd).await
}

/// Find the root of the main repository containing `cwd`.
///
/// Uses the common git dir, so this resolves to the main checkout even when
/// called from inside a linked worktree.
pub async fn find_repo_root(cwd: &Path) -> Option<PathBuf> {
    let common = run_git(&["rev-parse", "--git-common-dir"], Some(cwd))
        .await
        .ok()?;
    if common.is_empty() {
        return None;
    }

    let common = cwd.join(common);
    let resolved = common.canonicalize().unwrap_or(common);
    resolved.parent().map(Path::to_path_buf)
}

/// Whether the checkout at `path` has uncommitted changes
pub async fn is_dirty(path: &Path) -> bool {
    run_git(&["status", "--porcelain"], Some(path))
        .await
        .map(|out| !out.trim().is_empty())
        .unwrap_or(false)
}

/// A git repository rooted at its main checkout
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Wrap a known repository root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the repository containing `cwd`
    pub async fn discover(cwd: &Path) -> Result<Self> {
        find_repo_root(cwd)
            .await
            .map(Self::new)
            .ok_or_else(|| Error::NotFound("Not in a git repository".to_string()))
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the repository root
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        run_git(args, Some(&self.root)).await
    }

    /// Detect the default branch
    ///
    /// Prefers `origin/HEAD`, then a local `main` or `master`, then `main`.
    pub async fn default_branch(&self) -> String {
        if let Ok(head) = self
            .git(&["symbolic-ref", "refs/remotes/origin/HEAD"])
            .await
        {
            if let Some(name) = head.rsplit('/').next().filter(|n| !n.is_empty()) {
                return name.to_string();
            }
        }

        for candidate in ["main", "master"] {
            if self.branch_exists(candidate).await {
                return candidate.to_string();
            }
        }

        "main".to_string()
    }

    /// Current branch of the main checkout, `None` when detached
    pub async fn current_branch(&self) -> Option<String> {
        current_branch_at(&self.root).await
    }

    /// Sorted, deduplicated branch names, optionally including remotes
    pub async fn list_branches(&self, include_remote: bool) -> Vec<String> {
        let mut args = vec!["branch", "--format=%(refname:short)"];
        if include_remote {
            args.push("-a");
        }

        let Ok(out) = self.git(&args).await else {
            return Vec::new();
        };

        let mut branches: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|b| !b.is_empty() && !b.contains("HEAD"))
            .map(str::to_string)
            .collect();
        branches.sort();
        branches.dedup();
        branches
    }

    /// Whether a local branch named `name` exists
    pub async fn branch_exists(&self, name: &str) -> bool {
        let refname = format!("refs/heads/{}", name);
        self.git(&["rev-parse", "--verify", "--quiet", &refname])
            .await
            .is_ok()
    }

    /// Create `name` pointing at `base`
    pub async fn create_branch(&self, name: &str, base: &str) -> Result<()> {
        self.git(&["branch", name, base]).await.map(|_| ())
    }

    /// Delete a local branch, `-D` when `force`
    pub async fn delete_branch(&self, name: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.git(&["branch", flag, name]).await.map(|_| ())
    }

    /// `git fetch --prune origin`
    pub async fn fetch_origin(&self) -> Result<()> {
        debug!(repo = %self.root.display(), "Fetching origin");
        self.git(&["fetch", "--prune", "origin"]).await.map(|_| ())
    }

    /// Fetch a pull request head into a local branch
    pub async fn fetch_pr_head(&self, number: u64, branch: &str) -> Result<()> {
        let refspec = format!("pull/{}/head:{}", number, branch);
        self.git(&["fetch", "origin", &refspec]).await.map(|_| ())
    }

    /// URL of the `origin` remote, if configured
    pub async fn origin_url(&self) -> Option<String> {
        origin_url_at(&self.root).await
    }

    /// Point `origin` at a new URL
    pub async fn set_origin_url(&self, url: &str) -> Result<()> {
        self.git(&["remote", "set-url", "origin", url])
            .await
            .map(|_| ())
    }

    /// `git pull --ff-only`
    pub async fn pull_ff_only(&self) -> Result<()> {
        self.git(&["pull", "--ff-only"]).await.map(|_| ())
    }

    /// Whether the main checkout has uncommitted changes
    pub async fn is_dirty(&self) -> bool {
        is_dirty(&self.root).await
    }
}

/// Current branch of the checkout at `path`
pub async fn current_branch_at(path: &Path) -> Option<String> {
    run_git(&["branch", "--show-current"], Some(path))
        .await
        .ok()
        .filter(|b| !b.is_empty())
}

/// `origin` URL of the checkout at `path`
pub async fn origin_url_at(path: &Path) -> Option<String> {
    run_git(&["remote", "get-url", "origin"], Some(path))
        .await
        .ok()
        .filter(|u| !u.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn init_repo(path: &Path) {
        std::fs::create_dir_all(path).unwrap();
        run_git(&["init", "-q", "-b", "main"], Some(path))
            .await
            .unwrap();
        run_git(
            &[
                "-c",
                "user.name=Test",
                "-c",
                "user.email=test@example.com",
                "commit",
                "-q",
                "--allow-empty",
                "-m",
                "init",
            ],
            Some(path),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_find_repo_root_from_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("proj");
        init_repo(&repo).await;
        let nested = repo.join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let root = find_repo_root(&nested).await.unwrap();
        assert_eq!(root, repo.canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_find_repo_root_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_repo_root(dir.path()).await.is_none());
        assert!(matches!(
            GitRepo::discover(dir.path()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_branch_helpers() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let repo = GitRepo::new(dir.path());

        assert_eq!(repo.current_branch().await.as_deref(), Some("main"));
        assert_eq!(repo.default_branch().await, "main");
        assert!(repo.branch_exists("main").await);
        assert!(!repo.branch_exists("feature").await);

        repo.create_branch("feature", "main").await.unwrap();
        assert!(repo.branch_exists("feature").await);
        assert_eq!(repo.list_branches(false).await, vec!["feature", "main"]);

        repo.delete_branch("feature", false).await.unwrap();
        assert!(!repo.branch_exists("feature").await);
    }

    #[tokio::test]
    async fn test_dirty_and_origin() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let repo = GitRepo::new(dir.path());

        assert!(!repo.is_dirty().await);
        std::fs::write(dir.path().join("new.txt"), "x").unwrap();
        assert!(repo.is_dirty().await);

        assert!(repo.origin_url().await.is_none());
        run_git(
            &["remote", "add", "origin", "git@github.com:me/proj.git"],
            Some(dir.path()),
        )
        .await
        .unwrap();
        assert_eq!(
            repo.origin_url().await.as_deref(),
            Some("git@github.com:me/proj.git")
        );

        repo.set_origin_url("https://github.com/me/renamed.git")
            .await
            .unwrap();
        assert_eq!(
            repo.origin_url().await.as_deref(),
            Some("https://github.com/me/renamed.git")
        );
    }
}
