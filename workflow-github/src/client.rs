//! GitHub access through the `gh` CLI

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use workflow_core::process;

use crate::{Error, Result};

/// Owner and name of the current repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// Owning user or organization
    pub owner: String,
    /// Repository name
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RepoViewJson {
    owner: OwnerJson,
    name: String,
}

#[derive(Debug, Deserialize)]
struct OwnerJson {
    login: String,
}

/// Outcome of a mutating GitHub action
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ActionResult {
    /// Whether the action succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
}

impl ActionResult {
    /// A successful action
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed action
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    /// Collapse a fallible call into an action result
    pub(crate) fn from_result<T>(result: Result<T>, ok: impl Into<String>, failed: impl Into<String>) -> Self {
        match result {
            Ok(_) => Self::ok(ok),
            Err(e) => {
                debug!(error = %e, "GitHub action failed");
                Self::failed(failed)
            }
        }
    }
}

/// Client that shells out to `gh`, optionally inside a directory
#[derive(Debug, Clone, Default)]
pub struct GhClient {
    cwd: Option<PathBuf>,
}

impl GhClient {
    /// Client running in the process working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Client running inside `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(dir.into()),
        }
    }

    /// Directory `gh` runs in, if pinned
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Run `gh` and return trimmed stdout
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let output = process::run("gh", args, self.cwd()).await?;
        if !output.success() {
            return Err(Error::Command(output.error_line()));
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Run `gh` and decode its JSON output
    pub async fn json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let out = self.run(args).await?;
        serde_json::from_str(&out).map_err(|e| Error::Parse(format!("gh {}: {}", args.join(" "), e)))
    }

    /// Owner and name of the repository in the working directory
    pub async fn repo_info(&self) -> Result<RepoInfo> {
        let view: RepoViewJson = self
            .json(&["repo", "view", "--json", "owner,name"])
            .await
            .map_err(|e| {
                debug!(error = %e, "gh repo view failed");
                Error::NotGitHubRepo
            })?;
        Ok(RepoInfo {
            owner: view.owner.login,
            name: view.name,
        })
    }

    /// Login of the authenticated user
    pub async fn viewer_login(&self) -> Result<String> {
        let login = self.run(&["api", "user", "--jq", ".login"]).await?;
        if login.is_empty() {
            return Err(Error::Other("Could not determine your GitHub username".to_string()));
        }
        Ok(login)
    }
}
