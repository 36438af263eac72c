//! Discovered repository records

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::git::origin_url_at;

/// Hosting service of a repository's `origin` remote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// github.com
    Github,
    /// Any GitLab instance
    Gitlab,
    /// Any Bitbucket instance
    Bitbucket,
    /// Some other remote
    Other,
    /// No `origin` remote configured
    #[default]
    Local,
}

impl RemoteKind {
    /// Classify a remote URL by case-insensitive substring match
    pub fn classify(remote: Option<&str>) -> Self {
        let Some(url) = remote.map(str::trim).filter(|u| !u.is_empty()) else {
            return RemoteKind::Local;
        };

        let url = url.to_ascii_lowercase();
        if url.contains("github.com") {
            RemoteKind::Github
        } else if url.contains("gitlab") {
            RemoteKind::Gitlab
        } else if url.contains("bitbucket") {
            RemoteKind::Bitbucket
        } else {
            RemoteKind::Other
        }
    }

    /// Lowercase label, as persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteKind::Github => "github",
            RemoteKind::Gitlab => "gitlab",
            RemoteKind::Bitbucket => "bitbucket",
            RemoteKind::Other => "other",
            RemoteKind::Local => "local",
        }
    }
}

impl std::fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered repository, as stored in `repos.json`
///
/// Unknown fields are ignored and missing ones take their defaults, so older
/// and newer cache files both load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoRecord {
    /// Final path segment
    pub name: String,
    /// Absolute, resolved repository root
    pub path: PathBuf,
    /// `origin` URL, if any
    pub remote: Option<String>,
    /// Classification of `remote`
    pub remote_type: RemoteKind,
}

impl RepoRecord {
    /// Build a record from a path and an optional remote URL
    pub fn new(path: impl Into<PathBuf>, remote: Option<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let remote_type = RemoteKind::classify(remote.as_deref());
        Self {
            name,
            path,
            remote,
            remote_type,
        }
    }

    /// Read the `origin` remote of `path` and build its record
    pub async fn inspect(path: &Path) -> Self {
        let remote = origin_url_at(path).await;
        Self::new(path, remote)
    }
}
