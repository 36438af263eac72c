//! Repository-level GitHub operations

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, GhClient, Result};

/// Visibility of a newly created repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only visible to the owner
    #[default]
    Private,
    /// Visible to everyone
    Public,
}

impl Visibility {
    /// Flag passed to `gh repo create`
    pub fn flag(&self) -> &'static str {
        match self {
            Visibility::Private => "--private",
            Visibility::Public => "--public",
        }
    }

    /// Lowercase name for messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

/// One of the viewer's own repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedRepo {
    /// Repository name without owner
    pub name: String,
    /// Web URL
    #[serde(default)]
    pub url: String,
    /// Description, empty when unset
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

/// A repository search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// `owner/name`
    #[serde(rename = "fullName")]
    pub full_name: String,
    /// Description, empty when unset
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

fn null_as_empty<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

/// SSH clone URL for `owner/name`
pub fn ssh_clone_url(owner: &str, name: &str) -> String {
    format!("git@github.com:{}/{}.git", owner, name)
}

/// Owner segment of the URL printed by `gh repo create`
pub fn owner_from_repo_url(url: &str) -> Option<&str> {
    let mut parts = url.trim().trim_end_matches('/').rsplit('/');
    parts.next()?;
    parts.next().filter(|owner| !owner.is_empty())
}

impl GhClient {
    /// The viewer's repositories, up to 100
    pub async fn list_own_repos(&self) -> Result<Vec<OwnedRepo>> {
        self.json(&["repo", "list", "--json", "name,url,description", "--limit", "100"])
            .await
    }

    /// Create a repository and return the URL `gh` prints
    pub async fn create_repo(
        &self,
        name: &str,
        visibility: Visibility,
        description: Option<&str>,
    ) -> Result<String> {
        let mut args = vec!["repo", "create", name, visibility.flag()];
        if let Some(description) = description {
            args.extend(["--description", description]);
        }
        let url = self.run(&args).await?;
        info!(name, visibility = visibility.as_str(), "Created repository");
        Ok(url)
    }

    /// Fork `owner/name` without cloning it
    pub async fn fork_repo(&self, full_name: &str) -> Result<()> {
        self.run(&["repo", "fork", full_name, "--clone=false"]).await?;
        Ok(())
    }

    /// Rename the repository this client runs in
    pub async fn rename_repo(&self, new_name: &str) -> Result<()> {
        if self.cwd().is_none() {
            return Err(Error::Other(
                "Renaming needs the repository directory".to_string(),
            ));
        }
        self.run(&["repo", "rename", new_name, "-y"]).await?;
        Ok(())
    }

    /// Search public repositories, up to 20 hits
    pub async fn search_repos(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.json(&[
            "search",
            "repos",
            "--json",
            "fullName,description",
            "--limit",
            "20",
            query,
        ])
        .await
    }

    /// Clone `spec` (a name or `owner/name`) into `dest`
    pub async fn clone_repo(&self, spec: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        self.run(&["repo", "clone", spec, &dest]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owned_repos() {
        let json = r#"[
            {"name": "tools", "url": "https://github.com/me/tools", "description": "Shell helpers"},
            {"name": "notes", "url": "https://github.com/me/notes", "description": null}
        ]"#;
        let repos: Vec<OwnedRepo> = serde_json::from_str(json).unwrap();
        assert_eq!(repos[0].description, "Shell helpers");
        assert_eq!(repos[1].description, "");
    }

    #[test]
    fn test_parse_search_hits() {
        let json = r#"[{"fullName": "rust-lang/rust", "description": "Empowering everyone"}]"#;
        let hits: Vec<SearchHit> = serde_json::from_str(json).unwrap();
        assert_eq!(hits[0].full_name, "rust-lang/rust");
    }

    #[test]
    fn test_owner_from_repo_url() {
        assert_eq!(owner_from_repo_url("https://github.com/me/tools"), Some("me"));
        assert_eq!(owner_from_repo_url("https://github.com/me/tools/\n"), Some("me"));
        assert_eq!(owner_from_repo_url("tools"), None);
    }

    #[test]
    fn test_ssh_clone_url() {
        assert_eq!(ssh_clone_url("me", "tools"), "git@github.com:me/tools.git");
    }

    #[test]
    fn test_visibility_flags() {
        assert_eq!(Visibility::default(), Visibility::Private);
        assert_eq!(Visibility::Public.flag(), "--public");
        assert_eq!(Visibility::Private.as_str(), "private");
    }

    #[tokio::test]
    async fn test_rename_requires_directory() {
        let err = GhClient::new().rename_repo("x").await.unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }
}
