//! Allow-list checks for user-supplied identifiers
//!
//! Every check returns the accepted value or `Error::Validation` naming the
//! rule that was violated.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Maximum length of a GitHub user or organization name
pub const GITHUB_OWNER_MAX_LENGTH: usize = 39;
/// Maximum length of a GitHub repository name
pub const GITHUB_REPO_MAX_LENGTH: usize = 100;
/// Maximum length of a tmux session name
pub const TMUX_SESSION_MAX_LENGTH: usize = 256;

/// Worktree names: `[A-Za-z0-9][A-Za-z0-9._-]*`, no traversal, no separators
pub fn validate_worktree_name(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(Error::validation("Worktree name cannot be empty"));
    }

    if name.contains("..") || name.starts_with('/') || name.starts_with('~') {
        return Err(Error::validation(format!(
            "Invalid worktree name: {:?} (path traversal not allowed)",
            name
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(Error::validation(format!(
            "Invalid worktree name: {:?} (path separators not allowed)",
            name
        )));
    }

    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !first_ok || !rest_ok {
        return Err(Error::validation(format!(
            "Invalid worktree name: {:?} (use alphanumeric, hyphens, underscores)",
            name
        )));
    }

    Ok(name)
}

/// Branch names, following the dangerous subset of git-check-ref-format
pub fn validate_branch_name(branch: &str) -> Result<&str> {
    if branch.is_empty() {
        return Err(Error::validation("Branch name cannot be empty"));
    }

    const FORBIDDEN: [&str; 11] = ["..", "~", "^", ":", "\\", " ", "\t", "\n", "?", "*", "["];
    if let Some(bad) = FORBIDDEN.iter().find(|pat| branch.contains(*pat)) {
        return Err(Error::validation(format!(
            "Invalid branch name: contains {:?}",
            bad
        )));
    }

    if branch.starts_with('/') || branch.ends_with('/') {
        return Err(Error::validation("Branch name cannot start or end with /"));
    }
    if branch.starts_with('.') || branch.ends_with('.') {
        return Err(Error::validation("Branch name cannot start or end with ."));
    }
    if branch.ends_with(".lock") {
        return Err(Error::validation("Branch name cannot end with .lock"));
    }
    if branch.contains("//") {
        return Err(Error::validation(
            "Branch name cannot contain consecutive slashes",
        ));
    }

    Ok(branch)
}

/// PR numbers must parse as positive integers
pub fn validate_pr_number(raw: &str) -> Result<u64> {
    let num: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::validation(format!("Invalid PR number: {:?}", raw)))?;

    if num <= 0 {
        return Err(Error::validation(format!(
            "PR number must be positive: {}",
            num
        )));
    }

    Ok(num as u64)
}

/// GitHub user/organization: 1-39 chars, alphanumeric or single hyphens
pub fn validate_github_owner(owner: &str) -> Result<&str> {
    if owner.is_empty() {
        return Err(Error::validation("GitHub owner cannot be empty"));
    }
    if owner.len() > GITHUB_OWNER_MAX_LENGTH {
        return Err(Error::validation(format!("GitHub owner too long: {:?}", owner)));
    }

    let mut chars = owner.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !first_ok || !rest_ok || owner.contains("--") || owner.ends_with('-') {
        return Err(Error::validation(format!("Invalid GitHub owner: {:?}", owner)));
    }

    Ok(owner)
}

/// GitHub repository names: alphanumeric, `.`, `_`, `-`; not `.` or `..`
pub fn validate_github_repo(repo: &str) -> Result<&str> {
    if repo.is_empty() {
        return Err(Error::validation("Repository name cannot be empty"));
    }
    if repo.len() > GITHUB_REPO_MAX_LENGTH {
        return Err(Error::validation(format!(
            "Repository name too long: {:?}",
            repo
        )));
    }
    if repo == "." || repo == ".." {
        return Err(Error::validation(format!(
            "Invalid repository name: {:?}",
            repo
        )));
    }
    if !repo
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(Error::validation(format!(
            "Invalid repository name: {:?}",
            repo
        )));
    }

    Ok(repo)
}

/// tmux session names: non-empty, bounded, no `:`/`.`/control characters
pub fn validate_tmux_session_name(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(Error::validation("Session name cannot be empty"));
    }
    if name.len() > TMUX_SESSION_MAX_LENGTH {
        return Err(Error::validation("Session name too long"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| *c == ':' || *c == '.' || c.is_control())
    {
        return Err(Error::validation(format!(
            "Invalid session name: {:?} (contains {:?})",
            name, bad
        )));
    }
    Ok(name)
}

/// Resolve `path` like a non-strict `realpath`: the longest existing prefix
/// is canonicalized and the remaining components are appended verbatim.
pub fn resolve_lenient(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(resolved) = existing.canonicalize() {
            let mut out = resolved;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return normalize(&out);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalize(&absolute),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The system temp directory, symlinks resolved
pub fn system_temp_dir() -> PathBuf {
    resolve_lenient(&std::env::temp_dir())
}

/// Paths handed to us for scratch files must resolve inside the temp dir
pub fn validate_temp_path(raw: &str) -> Result<PathBuf> {
    validate_within(raw, &system_temp_dir())
}

/// Resolve `raw` and require it to stay under `base`
pub fn validate_within(raw: &str, base: &Path) -> Result<PathBuf> {
    if raw.is_empty() {
        return Err(Error::validation("Path cannot be empty"));
    }

    let resolved = resolve_lenient(Path::new(raw));
    let base = resolve_lenient(base);
    if !resolved.starts_with(&base) {
        return Err(Error::validation(format!(
            "Path must be within {}: {:?}",
            base.display(),
            raw
        )));
    }

    Ok(resolved)
}

/// Parse `(owner, repo)` out of a GitHub remote URL.
///
/// Handles `https://github.com/owner/repo(.git)` and
/// `git@github.com:owner/repo(.git)`; anything else, or components that fail
/// validation, yields `None`.
pub fn parse_github_url(remote: &str) -> Option<(String, String)> {
    let remote = remote.trim();

    let path = if let Some(rest) = remote.strip_prefix("git@") {
        let (host, path) = rest.split_once(':')?;
        if !host.eq_ignore_ascii_case("github.com") {
            return None;
        }
        path.to_string()
    } else {
        let parsed = url::Url::parse(remote).ok()?;
        if !parsed
            .host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case("github.com"))
        {
            return None;
        }
        parsed.path().to_string()
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    validate_github_owner(owner).ok()?;
    validate_github_repo(repo).ok()?;
    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worktree_name_rules() {
        assert_eq!(validate_worktree_name("feature-1").unwrap(), "feature-1");
        assert!(validate_worktree_name("v1.2_fix").is_ok());
        assert!(validate_worktree_name("").is_err());
        assert!(validate_worktree_name("../etc").is_err());
        assert!(validate_worktree_name("~home").is_err());
        assert!(validate_worktree_name("a/b").is_err());
        assert!(validate_worktree_name("a\\b").is_err());
        assert!(validate_worktree_name(".hidden").is_err());
        assert!(validate_worktree_name("-dash").is_err());
        assert!(validate_worktree_name("sp ace").is_err());
    }

    #[test]
    fn test_worktree_name_error_mentions_rule() {
        let err = validate_worktree_name("a/b").unwrap_err();
        assert!(err.to_string().contains("path separators"));
    }

    #[test]
    fn test_branch_name_rules() {
        assert!(validate_branch_name("feature/login").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("a..b").is_err());
        assert!(validate_branch_name("has space").is_err());
        assert!(validate_branch_name("what?").is_err());
        assert!(validate_branch_name("/lead").is_err());
        assert!(validate_branch_name("trail/").is_err());
        assert!(validate_branch_name(".dot").is_err());
        assert!(validate_branch_name("dot.").is_err());
        assert!(validate_branch_name("ref.lock").is_err());
        assert!(validate_branch_name("a//b").is_err());
    }

    #[test]
    fn test_pr_number() {
        assert_eq!(validate_pr_number("42").unwrap(), 42);
        assert_eq!(validate_pr_number(" 7 ").unwrap(), 7);
        assert!(validate_pr_number("0").is_err());
        assert!(validate_pr_number("-3").is_err());
        assert!(validate_pr_number("abc").is_err());
    }

    #[test]
    fn test_github_owner() {
        assert!(validate_github_owner("octo-cat").is_ok());
        assert!(validate_github_owner("").is_err());
        assert!(validate_github_owner("-lead").is_err());
        assert!(validate_github_owner("trail-").is_err());
        assert!(validate_github_owner("double--dash").is_err());
        assert!(validate_github_owner(&"a".repeat(40)).is_err());
        assert!(validate_github_owner(&"a".repeat(39)).is_ok());
    }

    #[test]
    fn test_github_repo() {
        assert!(validate_github_repo("my_repo.rs-2").is_ok());
        assert!(validate_github_repo(".").is_err());
        assert!(validate_github_repo("..").is_err());
        assert!(validate_github_repo("bad/name").is_err());
        assert!(validate_github_repo(&"r".repeat(101)).is_err());
    }

    #[test]
    fn test_tmux_session_name() {
        assert!(validate_tmux_session_name("main").is_ok());
        assert!(validate_tmux_session_name("").is_err());
        assert!(validate_tmux_session_name("a:b").is_err());
        assert!(validate_tmux_session_name("a.b").is_err());
        assert!(validate_tmux_session_name("a\u{1b}b").is_err());
        assert!(validate_tmux_session_name(&"s".repeat(257)).is_err());
    }

    #[test]
    fn test_parse_github_url() {
        assert_eq!(
            parse_github_url("https://github.com/owner/repo"),
            Some(("owner".to_string(), "repo".to_string()))
        );
        assert_eq!(
            parse_github_url("https://github.com/owner/repo.git"),
            Some(("owner".to_string(), "repo".to_string()))
        );
        assert_eq!(
            parse_github_url("git@github.com:owner/repo.git"),
            Some(("owner".to_string(), "repo".to_string()))
        );
        assert_eq!(parse_github_url("https://gitlab.com/owner/repo"), None);
        assert_eq!(parse_github_url("git@github.com:-bad/repo.git"), None);
        assert_eq!(parse_github_url(""), None);
    }

    #[test]
    fn test_validate_within_rejects_escape() {
        let base = tempfile::tempdir().unwrap();
        let inside = base.path().join("file.txt");
        let resolved = validate_within(inside.to_str().unwrap(), base.path()).unwrap();
        assert!(resolved.starts_with(base.path().canonicalize().unwrap()));

        let escape = format!("{}/../../etc/passwd", base.path().display());
        assert!(validate_within(&escape, base.path()).is_err());
        assert!(validate_within("", base.path()).is_err());
    }

    #[test]
    fn test_validate_temp_path() {
        let inside = std::env::temp_dir().join(".wt_cd_12345");
        assert!(validate_temp_path(inside.to_str().unwrap()).is_ok());
        assert!(validate_temp_path("/etc/passwd").is_err());
    }

    #[test]
    fn test_resolve_lenient_nonexistent_tail() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("file");
        let resolved = resolve_lenient(&target);
        assert_eq!(
            resolved,
            dir.path().canonicalize().unwrap().join("missing").join("file")
        );
    }
}
