//! Filesystem scan for git repositories
//!
//! Each root is walked with `find`, pruning dependency and build directories,
//! and every `.git` directory found marks its parent as a repository.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::record::RepoRecord;
use crate::process;

/// Directory names the scan never descends into
pub const PRUNED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    "target",
    "build",
    "dist",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
];

fn find_args(root: &Path) -> Vec<String> {
    let mut args = vec![root.to_string_lossy().to_string(), "(".to_string()];
    for (i, name) in PRUNED_DIRS.iter().enumerate() {
        if i > 0 {
            args.push("-o".to_string());
        }
        args.push("-name".to_string());
        args.push((*name).to_string());
    }
    args.extend(
        [")", "-prune", "-o", "-type", "d", "-name", ".git", "-print"]
            .iter()
            .map(|s| s.to_string()),
    );
    args
}

/// Whether `repo` sits under a hidden directory relative to `root`
fn under_hidden_dir(root: &Path, repo: &Path) -> bool {
    let Ok(relative) = repo.strip_prefix(root) else {
        return false;
    };
    relative.components().any(|c| match c {
        Component::Normal(seg) => seg.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

const SCANNER: &str = "find";

async fn scan_root(scanner: &str, root: &Path, timeout: Duration) -> Vec<PathBuf> {
    let args = find_args(root);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = match process::run_with_timeout(scanner, &args, None, timeout).await {
        Ok(output) => output,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "Skipping scan root");
            return Vec::new();
        }
    };

    // find exits nonzero on unreadable subdirectories; its stdout is still usable
    if !output.success() {
        debug!(root = %root.display(), stderr = %output.error_line(), "find reported errors");
    }

    output
        .stdout
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| Path::new(line).parent().map(Path::to_path_buf))
        .filter(|repo| !under_hidden_dir(root, repo))
        .collect()
}

/// Discover git repositories under `roots`.
///
/// Missing roots are skipped, a root whose scan fails or times out
/// contributes nothing, and a repository reachable from several roots is
/// reported once. The result is sorted by name, case-insensitively, keeping
/// discovery order among equal names.
pub async fn discover_repos(roots: &[PathBuf], timeout: Duration) -> Vec<RepoRecord> {
    discover_with(SCANNER, roots, timeout).await
}

async fn discover_with(scanner: &str, roots: &[PathBuf], timeout: Duration) -> Vec<RepoRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for root in roots {
        let Ok(root) = root.canonicalize() else {
            debug!(root = %root.display(), "Scan root does not exist");
            continue;
        };
        if !root.is_dir() {
            continue;
        }

        for repo in scan_root(scanner, &root, timeout).await {
            if !seen.insert(repo.clone()) {
                continue;
            }
            records.push(RepoRecord::inspect(&repo).await);
        }
    }

    records.sort_by_key(|r| r.name.to_lowercase());
    info!(roots = roots.len(), repos = records.len(), "Repository scan complete");
    records
}
